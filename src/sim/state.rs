//! Entity records shared by the simulation and its observers
//!
//! Edges and score popups are live until they die, then linger in a dead
//! list long enough for a presenter to fade them out.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::segment::Segment;

/// Stable identifier of an edge, stored in its physics collider
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// A destructible line segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub a: Vec2,
    pub b: Vec2,
    /// Tick the edge was removed from the world (`None` while live)
    death_tick: Option<u64>,
}

impl Edge {
    pub fn new(id: EdgeId, a: Vec2, b: Vec2) -> Self {
        Self {
            id,
            a,
            b,
            death_tick: None,
        }
    }

    pub fn segment(&self) -> Segment {
        Segment::new(self.a, self.b)
    }

    pub fn death_tick(&self) -> Option<u64> {
        self.death_tick
    }

    pub fn is_live(&self) -> bool {
        self.death_tick.is_none()
    }

    /// Stamp the death tick. An edge dies once; later calls keep the first tick.
    pub fn kill(&mut self, tick: u64) {
        debug_assert!(self.death_tick.is_none(), "edge {:?} killed twice", self.id);
        self.death_tick.get_or_insert(tick);
    }
}

/// A floating "+N" popup at the spot an edge was hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub position: Vec2,
    pub value: u32,
    death_tick: Option<u64>,
}

impl Score {
    pub fn new(position: Vec2, value: u32) -> Self {
        Self {
            position,
            value,
            death_tick: None,
        }
    }

    pub fn death_tick(&self) -> Option<u64> {
        self.death_tick
    }

    pub fn is_live(&self) -> bool {
        self.death_tick.is_none()
    }

    pub fn kill(&mut self, tick: u64) {
        debug_assert!(self.death_tick.is_none(), "score popup killed twice");
        self.death_tick.get_or_insert(tick);
    }
}
