//! Bounze - a physics breakout game
//!
//! Core modules:
//! - `sim`: Simulation core (physics world, level generation, scoring, snapshots)
//! - `runner`: Fixed-rate simulation thread and its thread-safe handle
//! - `input`: Presenter input events mapped to game actions
//! - `tuning`: Data-driven game balance

pub mod input;
pub mod runner;
pub mod sim;
pub mod tuning;

pub use input::{Action, InputEvent, map_input};
pub use runner::{GameHandle, Runner};
pub use sim::{Edge, EdgeId, Game, Score, Snapshot};
pub use tuning::{Tuning, TuningError};

/// Game configuration constants
pub mod consts {
    /// Simulation rate (ticks per second)
    pub const FPS: u32 = 30;
    /// Solver iterations per step
    pub const VELOCITY_ITERATIONS: usize = 8;
    pub const POSITION_ITERATIONS: usize = 3;
    /// Most ticks the runner replays after falling behind
    pub const MAX_CATCHUP_TICKS: u32 = 8;

    /// Field dimensions (world units)
    pub const FIELD_WIDTH: u32 = 56;
    pub const FIELD_HEIGHT: u32 = 36;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 1.25;
    pub const BALL_DENSITY: f32 = 1.0;
    pub const BALL_FRICTION: f32 = 0.0;
    pub const BALL_RESTITUTION: f32 = 0.85;
    pub const BALL_DAMPING: f32 = 0.7;
    /// Below this speed the ball counts as stopped
    pub const BALL_CUTOFF: f32 = 5.0;
    /// Launch speed for every shot
    pub const BALL_VELOCITY: f32 = 60.0;

    /// Shots granted at level 0, plus one more every `SHOTS_LEVEL_STEP` levels
    pub const BASE_SHOTS: u32 = 10;
    pub const SHOTS_LEVEL_STEP: u32 = 5;
    /// Points per unused shot when a level is regenerated
    pub const SHOT_BONUS: u64 = 10;

    /// Screen pixels per world unit in the reference presenter
    pub const SCALE: f32 = 10.0;
}

/// Point on a circle of `radius` at angle `theta`
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> glam::Vec2 {
    glam::Vec2::new(r * theta.cos(), r * theta.sin())
}
