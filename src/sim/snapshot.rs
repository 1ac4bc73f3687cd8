//! Read-only view of the game for presenters
//!
//! A snapshot is an owned copy taken after a tick settles, so a renderer on
//! another thread never sees a half-updated world.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::state::{Edge, Score};

/// Ball state as seen by a presenter
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BallView {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub stopped: bool,
}

/// Everything needed to draw one frame
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub score: u64,
    pub shots: u32,
    pub level: u32,
    pub game_over: bool,
    pub running: bool,
    pub field: Vec2,
    pub ball: BallView,
    pub live_edges: Vec<Edge>,
    pub dead_edges: Vec<Edge>,
    pub live_scores: Vec<Score>,
    pub dead_scores: Vec<Score>,
    /// Ticks a dead entity takes to fade out
    pub fade_ticks: u64,
}

/// Opacity of something that died at `death_tick`, or `None` once fully faded
pub fn fade_alpha(death_tick: u64, now: u64, fade_ticks: u64) -> Option<f32> {
    let age = now.saturating_sub(death_tick);
    if age < fade_ticks {
        Some(1.0 - age as f32 / fade_ticks as f32)
    } else {
        None
    }
}

impl Snapshot {
    /// True if the player can take a shot right now
    pub fn can_shoot(&self) -> bool {
        self.ball.stopped && !self.game_over && self.shots > 0
    }

    /// Dead edges still visible, with their opacity
    pub fn fading_edges(&self) -> impl Iterator<Item = (&Edge, f32)> {
        self.dead_edges.iter().filter_map(|e| {
            let alpha = fade_alpha(e.death_tick()?, self.tick, self.fade_ticks)?;
            Some((e, alpha))
        })
    }

    /// Dead score popups still visible, with their opacity
    pub fn fading_scores(&self) -> impl Iterator<Item = (&Score, f32)> {
        self.dead_scores.iter().filter_map(|s| {
            let alpha = fade_alpha(s.death_tick()?, self.tick, self.fade_ticks)?;
            Some((s, alpha))
        })
    }

    /// Live edge whose midpoint is closest to `p`
    pub fn nearest_live_edge(&self, p: Vec2) -> Option<&Edge> {
        self.live_edges.iter().min_by(|a, b| {
            let da = a.segment().midpoint().distance_squared(p);
            let db = b.segment().midpoint().distance_squared(p);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::EdgeId;

    #[test]
    fn test_fade_alpha() {
        assert_eq!(fade_alpha(10, 10, 30), Some(1.0));
        let half = fade_alpha(10, 25, 30).unwrap();
        assert!((half - 0.5).abs() < 1e-6);
        assert_eq!(fade_alpha(10, 40, 30), None);
        assert_eq!(fade_alpha(10, 100, 30), None);
    }

    #[test]
    fn test_fading_edges_skip_old_ones() {
        let mut recent = Edge::new(EdgeId(1), Vec2::new(1.0, 1.0), Vec2::new(5.0, 1.0));
        recent.kill(95);
        let mut old = Edge::new(EdgeId(2), Vec2::new(1.0, 3.0), Vec2::new(5.0, 3.0));
        old.kill(10);

        let snapshot = Snapshot {
            tick: 100,
            fade_ticks: 30,
            dead_edges: vec![recent, old],
            ..Default::default()
        };
        let fading: Vec<_> = snapshot.fading_edges().collect();
        assert_eq!(fading.len(), 1);
        assert_eq!(fading[0].0.id, EdgeId(1));
    }

    #[test]
    fn test_fading_scores_skip_old_ones() {
        let mut recent = Score::new(Vec2::new(2.0, 2.0), 3);
        recent.kill(90);
        let mut old = Score::new(Vec2::new(8.0, 2.0), 1);
        old.kill(60);

        let snapshot = Snapshot {
            tick: 100,
            fade_ticks: 30,
            dead_scores: vec![recent, old],
            ..Default::default()
        };
        let fading: Vec<_> = snapshot.fading_scores().collect();
        assert_eq!(fading.len(), 1);
        assert_eq!(fading[0].0.value, 3);
        assert!((fading[0].1 - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_nearest_live_edge() {
        let snapshot = Snapshot {
            live_edges: vec![
                Edge::new(EdgeId(1), Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0)),
                Edge::new(EdgeId(2), Vec2::new(10.0, 10.0), Vec2::new(12.0, 10.0)),
            ],
            ..Default::default()
        };
        let nearest = snapshot.nearest_live_edge(Vec2::new(9.0, 9.0)).unwrap();
        assert_eq!(nearest.id, EdgeId(2));
        assert!(Snapshot::default().nearest_live_edge(Vec2::ZERO).is_none());
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let snapshot = Snapshot {
            tick: 12,
            score: 40,
            shots: 3,
            level: 2,
            field: Vec2::new(56.0, 36.0),
            live_scores: vec![Score::new(Vec2::new(4.0, 4.0), 2)],
            ..Default::default()
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
