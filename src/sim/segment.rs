//! Line-segment geometry
//!
//! Edges are plain segments. The physics engine resolves the bounces; these
//! helpers only answer "where on the edge was it hit" and spacing queries.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// A line segment between two points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub a: Vec2,
    pub b: Vec2,
}

impl Segment {
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    pub fn length(&self) -> f32 {
        self.a.distance(self.b)
    }

    pub fn midpoint(&self) -> Vec2 {
        (self.a + self.b) * 0.5
    }

    /// Closest point on the segment to `p`
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        let ab = self.b - self.a;
        let len_sq = ab.length_squared();
        if len_sq <= f32::EPSILON {
            return self.a;
        }
        let t = ((p - self.a).dot(ab) / len_sq).clamp(0.0, 1.0);
        self.a + ab * t
    }

    /// Distance from `p` to the nearest point of the segment
    pub fn distance_to(&self, p: Vec2) -> f32 {
        self.closest_point(p).distance(p)
    }

    /// Where a ball centred at `center` touches the segment
    pub fn contact_point(&self, center: Vec2) -> Vec2 {
        self.closest_point(center)
    }
}
