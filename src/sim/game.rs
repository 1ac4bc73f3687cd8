//! Fixed timestep simulation tick
//!
//! `Game` owns the physics world and every entity. One call to
//! [`Game::tick`] advances the world one step and then settles the game
//! rules in a fixed order: sweep destroyed edges, handle the ball coming to
//! rest, detect a cleared level, regenerate, check for game over.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use rapier2d::prelude::RigidBodyHandle;

use super::level::{LevelGenerator, VertexSet};
use super::physics::{ContactEnd, PhysicsWorld};
use super::snapshot::{BallView, Snapshot};
use super::state::{Edge, EdgeId, Score};
use crate::tuning::Tuning;

/// A live edge and the body that represents it
#[derive(Debug)]
struct LiveEdge {
    edge: Edge,
    body: RigidBodyHandle,
}

/// The game core
pub struct Game {
    tuning: Tuning,
    rng: Pcg32,
    physics: PhysicsWorld,

    live_edges: BTreeMap<EdgeId, LiveEdge>,
    dead_edges: Vec<Edge>,
    /// Edges hit (or cleared) since the last sweep
    doomed: BTreeSet<EdgeId>,
    vertices: VertexSet,
    live_scores: Vec<Score>,
    dead_scores: Vec<Score>,

    tick: u64,
    score: u64,
    scorebase: u32,
    shots: u32,
    level: u32,
    game_over: bool,
    running: bool,
    generate_requested: bool,
    changed: bool,
    next_edge_id: u32,
}

impl Game {
    /// Create a running game. The first tick generates the opening level.
    pub fn new(tuning: Tuning, seed: u64) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let size = tuning.field_size();
        let margin = tuning.ball_radius;
        let start = Vec2::new(
            rng.random_range(margin..size.x - margin),
            rng.random_range(margin..size.y - margin),
        );
        let physics = PhysicsWorld::new(&tuning, start);
        log::info!("New game (seed {}), ball at {:?}", seed, start);

        Self {
            tuning,
            rng,
            physics,
            live_edges: BTreeMap::new(),
            dead_edges: Vec::new(),
            doomed: BTreeSet::new(),
            vertices: VertexSet::new(),
            live_scores: Vec::new(),
            dead_scores: Vec::new(),
            tick: 0,
            score: 0,
            scorebase: 0,
            shots: 0,
            level: 0,
            game_over: false,
            running: true,
            generate_requested: true,
            changed: false,
            next_edge_id: 0,
        }
    }

    pub fn start(&mut self) {
        self.changed |= !self.running;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.changed |= self.running;
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Ask for a fresh level on the next tick
    pub fn generate(&mut self) {
        self.generate_requested = true;
    }

    pub fn generate_requested(&self) -> bool {
        self.generate_requested
    }

    /// Launch the ball along `direction`. Ignored (returns false) unless the
    /// ball is at rest, the game is on and a shot is left.
    pub fn shoot(&mut self, direction: Vec2) -> bool {
        if !self.ball_stopped() || self.game_over || self.shots == 0 {
            return false;
        }
        let dir = direction.normalize_or_zero();
        if dir == Vec2::ZERO {
            return false;
        }
        self.shots -= 1;
        self.physics.set_ball_velocity(dir * self.tuning.launch_speed);
        log::debug!("Shot {:?}, {} left", dir, self.shots);
        self.changed = true;
        true
    }

    /// Start over from level 0. The field is rebuilt on the next tick.
    pub fn reset(&mut self) {
        log::info!("Reset (score was {}, level {})", self.score, self.level);
        self.game_over = false;
        self.score = 0;
        self.shots = 0;
        self.scorebase = 0;
        // Pull the old field out now so the recentred ball never lands in it
        self.clear_level();
        self.sweep_dead_edges();
        self.live_scores.clear();
        self.dead_scores.clear();
        self.physics.place_ball(self.tuning.field_center());
        self.level = 0;
        self.generate();
        self.changed = true;
    }

    /// Advance the simulation one fixed step. Returns false while paused.
    pub fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }

        // 1. Physics
        let ended = self.physics.step();
        self.tick += 1;
        for contact in ended {
            self.handle_contact_end(contact);
        }

        // 2. Remove edges hit during the step
        self.sweep_dead_edges();

        // 3. Ball at rest ends the streak
        let stopped = self.ball_stopped();
        if stopped {
            self.physics.set_ball_velocity(Vec2::ZERO);
            self.scorebase = 0;
            self.retire_scores();
        }

        // 4. Level cleared
        if self.is_cleared() && stopped {
            self.level += 1;
            log::info!("Level cleared, advancing to level {}", self.level);
            self.generate();
        }

        // 5. Regenerate
        if self.generate_requested {
            self.regenerate();
        }

        // 6. Out of shots
        if stopped && self.shots == 0 && self.level > 0 && !self.game_over {
            self.game_over = true;
            log::info!("Game over at level {} with score {}", self.level, self.score);
        }

        // 7. Observers pull a snapshot
        self.changed = true;
        true
    }

    /// Score the first live edge involved in a contact that just ended
    pub fn handle_contact_end(&mut self, contact: ContactEnd) {
        let hit = [contact.first, contact.second]
            .into_iter()
            .filter_map(|tag| tag.edge())
            .find(|id| self.live_edges.contains_key(id) && !self.doomed.contains(id));
        let Some(id) = hit else {
            return;
        };
        let Some(live) = self.live_edges.get(&id) else {
            return;
        };
        let point = live
            .edge
            .segment()
            .contact_point(self.physics.ball_position());

        self.doomed.insert(id);
        self.scorebase += 1;
        self.score += u64::from(self.scorebase);
        self.live_scores.push(Score::new(point, self.scorebase));
        log::debug!("Edge {:?} hit at {:?} for {}", id, point, self.scorebase);
    }

    /// Ball speed is under the cutoff
    pub fn ball_stopped(&self) -> bool {
        self.physics.ball_velocity().length() < self.tuning.ball_cutoff
    }

    /// No live edges remain
    pub fn is_cleared(&self) -> bool {
        self.live_edges.is_empty()
    }

    /// Returns true once after every state change, then false until the next
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn scorebase(&self) -> u32 {
        self.scorebase
    }

    pub fn shots(&self) -> u32 {
        self.shots
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn ball_position(&self) -> Vec2 {
        self.physics.ball_position()
    }

    pub fn ball_velocity(&self) -> Vec2 {
        self.physics.ball_velocity()
    }

    pub fn live_edges(&self) -> impl Iterator<Item = &Edge> {
        self.live_edges.values().map(|l| &l.edge)
    }

    pub fn dead_edges(&self) -> &[Edge] {
        &self.dead_edges
    }

    pub fn live_scores(&self) -> &[Score] {
        &self.live_scores
    }

    pub fn dead_scores(&self) -> &[Score] {
        &self.dead_scores
    }

    /// Owned copy of the current state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            score: self.score,
            shots: self.shots,
            level: self.level,
            game_over: self.game_over,
            running: self.running,
            field: self.tuning.field_size(),
            ball: BallView {
                position: self.physics.ball_position(),
                velocity: self.physics.ball_velocity(),
                radius: self.tuning.ball_radius,
                stopped: self.ball_stopped(),
            },
            live_edges: self.live_edges().cloned().collect(),
            dead_edges: self.dead_edges.clone(),
            live_scores: self.live_scores.clone(),
            dead_scores: self.dead_scores.clone(),
            fade_ticks: self.tuning.fade_ticks,
        }
    }

    /// Add a live edge to the world
    pub fn add_edge(&mut self, a: Vec2, b: Vec2) -> EdgeId {
        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;
        let body = self.physics.add_edge(id, a, b);
        self.live_edges.insert(
            id,
            LiveEdge {
                edge: Edge::new(id, a, b),
                body,
            },
        );
        id
    }

    /// Move every doomed edge out of the world and into the dead list
    fn sweep_dead_edges(&mut self) {
        for id in std::mem::take(&mut self.doomed) {
            let Some(LiveEdge { mut edge, body }) = self.live_edges.remove(&id) else {
                continue;
            };
            if !self.physics.remove_body(body) {
                log::warn!("Edge {:?} had no physics body to remove", id);
            }
            edge.kill(self.tick);
            self.dead_edges.push(edge);
        }
    }

    /// Stamp every live score popup and move it to the dead list
    fn retire_scores(&mut self) {
        for mut score in self.live_scores.drain(..) {
            score.kill(self.tick);
            self.dead_scores.push(score);
        }
    }

    /// Doom all live edges and forget the level's vertices
    fn clear_level(&mut self) {
        self.vertices.clear();
        self.doomed.extend(self.live_edges.keys().copied());
    }

    fn regenerate(&mut self) {
        log::info!("Generating level {}", self.level);
        self.clear_level();

        self.score += u64::from(self.shots) * self.tuning.shot_bonus;
        self.shots = self.tuning.shots_for_level(self.level);

        // Only this level's casualties fade; older ones are gone
        self.dead_edges.clear();
        self.dead_scores.clear();
        self.retire_scores();

        let layout =
            LevelGenerator::new(&self.tuning, &mut self.rng, &mut self.vertices).generate(self.level);
        for seg in layout.segments {
            self.add_edge(seg.a, seg.b);
        }

        self.generate_requested = false;
    }
}
