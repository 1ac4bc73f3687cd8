//! Rigid-body world backed by rapier2d
//!
//! The field is a fixed box of four segments with one dynamic ball inside.
//! Edges are static segment bodies; each collider carries a [`BodyTag`] in
//! its user data so contact events map straight back to game entities.

use std::sync::Mutex;

use glam::Vec2;
use rapier2d::prelude::*;

use super::state::EdgeId;
use crate::tuning::Tuning;

/// What a collider belongs to, packed into its `user_data`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyTag {
    Boundary,
    Ball,
    Edge(EdgeId),
}

impl BodyTag {
    const BOUNDARY: u128 = 0;
    const BALL: u128 = 1;
    const EDGE_BASE: u128 = 2;

    pub fn to_user_data(self) -> u128 {
        match self {
            BodyTag::Boundary => Self::BOUNDARY,
            BodyTag::Ball => Self::BALL,
            BodyTag::Edge(id) => Self::EDGE_BASE + u128::from(id.0),
        }
    }

    pub fn from_user_data(data: u128) -> Self {
        match data {
            Self::BOUNDARY => BodyTag::Boundary,
            Self::BALL => BodyTag::Ball,
            n => BodyTag::Edge(EdgeId((n - Self::EDGE_BASE) as u32)),
        }
    }

    pub fn edge(self) -> Option<EdgeId> {
        match self {
            BodyTag::Edge(id) => Some(id),
            _ => None,
        }
    }
}

/// Two bodies that stopped touching during a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEnd {
    pub first: BodyTag,
    pub second: BodyTag,
}

/// Collects collision-stopped events while rapier steps.
/// Events caused by removing a collider are dropped.
#[derive(Default)]
struct ContactCollector {
    ended: Mutex<Vec<(ColliderHandle, ColliderHandle)>>,
}

impl ContactCollector {
    fn drain(&self) -> Vec<(ColliderHandle, ColliderHandle)> {
        let mut ended = self
            .ended
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::take(&mut *ended)
    }
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let CollisionEvent::Stopped(h1, h2, flags) = event {
            if flags.contains(CollisionEventFlags::REMOVED) {
                return;
            }
            let mut ended = self
                .ended
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            ended.push((h1, h2));
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// The physics world: boundary, ball and edge bodies
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    events: ContactCollector,
    ball: RigidBodyHandle,
}

#[inline]
fn to_vector(v: Vec2) -> Vector<Real> {
    vector![v.x, v.y]
}

#[inline]
fn to_point(v: Vec2) -> Point<Real> {
    point![v.x, v.y]
}

impl PhysicsWorld {
    /// Build the boundary box and a ball resting at `ball_position`
    pub fn new(tuning: &Tuning, ball_position: Vec2) -> Self {
        let params = IntegrationParameters {
            dt: tuning.dt(),
            max_velocity_iterations: tuning.velocity_iterations,
            max_stabilization_iterations: tuning.position_iterations,
            ..Default::default()
        };

        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();

        // Boundary: one fixed body, four segment colliders
        let size = tuning.field_size();
        let corners = [
            Vec2::new(0.0, 0.0),
            Vec2::new(size.x, 0.0),
            Vec2::new(size.x, size.y),
            Vec2::new(0.0, size.y),
        ];
        let boundary = bodies.insert(RigidBodyBuilder::fixed().build());
        for i in 0..corners.len() {
            let side = ColliderBuilder::segment(
                to_point(corners[i]),
                to_point(corners[(i + 1) % corners.len()]),
            )
            .user_data(BodyTag::Boundary.to_user_data())
            .build();
            colliders.insert_with_parent(side, boundary, &mut bodies);
        }

        // Ball: restitution and friction mix like the classic engines do
        // (max bounce, no friction) regardless of what it hits
        let ball_body = RigidBodyBuilder::dynamic()
            .translation(to_vector(ball_position))
            .linear_damping(tuning.ball_damping)
            .ccd_enabled(true)
            .build();
        let ball = bodies.insert(ball_body);
        let ball_collider = ColliderBuilder::ball(tuning.ball_radius)
            .density(tuning.ball_density)
            .friction(tuning.ball_friction)
            .friction_combine_rule(CoefficientCombineRule::Min)
            .restitution(tuning.ball_restitution)
            .restitution_combine_rule(CoefficientCombineRule::Max)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .user_data(BodyTag::Ball.to_user_data())
            .build();
        colliders.insert_with_parent(ball_collider, ball, &mut bodies);

        Self {
            gravity: vector![0.0, 0.0],
            params,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            events: ContactCollector::default(),
            ball,
        }
    }

    /// Advance one fixed timestep, returning every contact that ended
    pub fn step(&mut self) -> Vec<ContactEnd> {
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            None,
            &(),
            &self.events,
        );

        self.events
            .drain()
            .into_iter()
            .filter_map(|(h1, h2)| {
                let first = self.colliders.get(h1)?;
                let second = self.colliders.get(h2)?;
                Some(ContactEnd {
                    first: BodyTag::from_user_data(first.user_data),
                    second: BodyTag::from_user_data(second.user_data),
                })
            })
            .collect()
    }

    /// Add a static segment body for edge `id`
    pub fn add_edge(&mut self, id: EdgeId, a: Vec2, b: Vec2) -> RigidBodyHandle {
        let body = self.bodies.insert(RigidBodyBuilder::fixed().build());
        let collider = ColliderBuilder::segment(to_point(a), to_point(b))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .user_data(BodyTag::Edge(id).to_user_data())
            .build();
        self.colliders
            .insert_with_parent(collider, body, &mut self.bodies);
        body
    }

    /// Remove an edge body and its collider. Returns false if it was already gone.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> bool {
        self.bodies
            .remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    /// Number of rigid bodies in the world (boundary and ball included)
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn ball_position(&self) -> Vec2 {
        self.bodies
            .get(self.ball)
            .map(|b| Vec2::new(b.translation().x, b.translation().y))
            .unwrap_or_default()
    }

    pub fn ball_velocity(&self) -> Vec2 {
        self.bodies
            .get(self.ball)
            .map(|b| Vec2::new(b.linvel().x, b.linvel().y))
            .unwrap_or_default()
    }

    pub fn set_ball_velocity(&mut self, velocity: Vec2) {
        if let Some(ball) = self.bodies.get_mut(self.ball) {
            ball.set_linvel(to_vector(velocity), true);
        }
    }

    /// Teleport the ball and bring it to rest
    pub fn place_ball(&mut self, position: Vec2) {
        if let Some(ball) = self.bodies.get_mut(self.ball) {
            ball.set_translation(to_vector(position), true);
            ball.set_linvel(vector![0.0, 0.0], true);
            ball.set_angvel(0.0, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_tag_round_trip() {
        for tag in [
            BodyTag::Boundary,
            BodyTag::Ball,
            BodyTag::Edge(EdgeId(0)),
            BodyTag::Edge(EdgeId(u32::MAX)),
        ] {
            assert_eq!(BodyTag::from_user_data(tag.to_user_data()), tag);
        }
        assert_eq!(BodyTag::Edge(EdgeId(9)).edge(), Some(EdgeId(9)));
        assert_eq!(BodyTag::Ball.edge(), None);
    }

    #[test]
    fn test_edge_bodies_added_and_removed_once() {
        let tuning = Tuning::default();
        let mut world = PhysicsWorld::new(&tuning, tuning.field_center());
        let base = world.body_count();

        let handle = world.add_edge(EdgeId(1), Vec2::new(5.0, 5.0), Vec2::new(10.0, 5.0));
        assert_eq!(world.body_count(), base + 1);

        assert!(world.remove_body(handle));
        assert_eq!(world.body_count(), base);
        assert!(!world.remove_body(handle));
    }

    #[test]
    fn test_ball_moves_without_gravity() {
        let tuning = Tuning::default();
        let mut world = PhysicsWorld::new(&tuning, tuning.field_center());

        // At rest with zero gravity the ball stays put
        world.step();
        assert!(world.ball_velocity().length() < 1e-4);
        assert!((world.ball_position() - tuning.field_center()).length() < 1e-4);

        world.set_ball_velocity(Vec2::new(10.0, 0.0));
        world.step();
        assert!(world.ball_position().x > tuning.field_center().x);
        // Damping only slows it down
        assert!(world.ball_velocity().x < 10.0);
        assert!(world.ball_velocity().x > 9.0);
    }

    #[test]
    fn test_place_ball_stops_it() {
        let tuning = Tuning::default();
        let mut world = PhysicsWorld::new(&tuning, tuning.field_center());
        world.set_ball_velocity(Vec2::new(30.0, 20.0));
        world.place_ball(Vec2::new(10.0, 10.0));
        assert_eq!(world.ball_position(), Vec2::new(10.0, 10.0));
        assert_eq!(world.ball_velocity(), Vec2::ZERO);
    }

    #[test]
    fn test_wall_contact_reports_boundary_and_ball() {
        let tuning = Tuning::default();
        let mut world = PhysicsWorld::new(&tuning, Vec2::new(50.0, 18.0));
        world.set_ball_velocity(Vec2::new(40.0, 0.0));

        let mut ended = Vec::new();
        for _ in 0..30 {
            ended.extend(world.step());
        }

        assert!(!ended.is_empty(), "ball should bounce off the right wall");
        for contact in ended {
            assert!(contact.first.edge().is_none());
            assert!(contact.second.edge().is_none());
        }
        // Bounced back to the left
        assert!(world.ball_velocity().x < 0.0);
    }
}
