//! Simulation core
//!
//! Everything that decides the outcome of a game lives here:
//! - Fixed timestep only
//! - Seeded RNG only (one `Pcg32` per game)
//! - Stable iteration order (edges keyed by id)
//! - No rendering or platform dependencies

pub mod game;
pub mod level;
pub mod physics;
pub mod segment;
pub mod snapshot;
pub mod state;

pub use game::Game;
pub use level::{LevelGenerator, LevelLayout, VertexSet};
pub use physics::{BodyTag, ContactEnd, PhysicsWorld};
pub use segment::Segment;
pub use snapshot::{BallView, Snapshot, fade_alpha};
pub use state::{Edge, EdgeId, Score};
