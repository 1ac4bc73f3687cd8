//! Game balance and physics tuning
//!
//! Every gameplay constant lives here so a run can be rebalanced from a JSON
//! file without recompiling. Missing keys fall back to the canonical ruleset.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;

/// Errors raised while loading or validating a tuning file.
#[derive(Debug, Error)]
pub enum TuningError {
    #[error("failed to read tuning file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse tuning JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid tuning value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Gameplay and physics parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // === Simulation ===
    /// Ticks per second
    pub fps: u32,
    pub velocity_iterations: usize,
    pub position_iterations: usize,

    // === Field ===
    pub field_width: u32,
    pub field_height: u32,

    // === Ball ===
    pub ball_radius: f32,
    pub ball_density: f32,
    pub ball_friction: f32,
    pub ball_restitution: f32,
    pub ball_damping: f32,
    /// Speed below which the ball is considered at rest
    pub ball_cutoff: f32,
    pub launch_speed: f32,

    // === Rules ===
    pub base_shots: u32,
    /// One extra shot per this many levels
    pub shots_level_step: u32,
    /// Points for every shot left over when a level regenerates
    pub shot_bonus: u64,
    /// Ticks a dead edge or score stays visible while fading
    pub fade_ticks: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            fps: FPS,
            velocity_iterations: VELOCITY_ITERATIONS,
            position_iterations: POSITION_ITERATIONS,

            field_width: FIELD_WIDTH,
            field_height: FIELD_HEIGHT,

            ball_radius: BALL_RADIUS,
            ball_density: BALL_DENSITY,
            ball_friction: BALL_FRICTION,
            ball_restitution: BALL_RESTITUTION,
            ball_damping: BALL_DAMPING,
            ball_cutoff: BALL_CUTOFF,
            launch_speed: BALL_VELOCITY,

            base_shots: BASE_SHOTS,
            shots_level_step: SHOTS_LEVEL_STEP,
            shot_bonus: SHOT_BONUS,
            fade_ticks: FPS as u64,
        }
    }
}

impl Tuning {
    /// Parse and validate tuning from a JSON string
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Load tuning from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TuningError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let tuning = Self::from_json(&json)?;
        log::info!("Loaded tuning from {}", path.as_ref().display());
        Ok(tuning)
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<(), TuningError> {
        fn invalid(field: &'static str, reason: &str) -> TuningError {
            TuningError::Invalid {
                field,
                reason: reason.to_string(),
            }
        }

        if self.fps == 0 {
            return Err(invalid("fps", "must be at least 1"));
        }
        if self.field_width < 16 || self.field_height < 16 {
            return Err(invalid("field_width", "field must be at least 16x16"));
        }
        if !(self.ball_radius > 0.0) {
            return Err(invalid("ball_radius", "must be positive"));
        }
        if self.ball_radius * 2.0 >= self.field_width.min(self.field_height) as f32 {
            return Err(invalid("ball_radius", "ball does not fit in the field"));
        }
        if !(self.ball_density > 0.0) {
            return Err(invalid("ball_density", "must be positive"));
        }
        if self.ball_damping < 0.0 || self.ball_friction < 0.0 || self.ball_restitution < 0.0 {
            return Err(invalid("ball_damping", "material values cannot be negative"));
        }
        if !(self.launch_speed > self.ball_cutoff) {
            return Err(invalid("launch_speed", "must exceed ball_cutoff"));
        }
        if self.shots_level_step == 0 {
            return Err(invalid("shots_level_step", "must be at least 1"));
        }
        Ok(())
    }

    /// Fixed simulation timestep in seconds
    pub fn dt(&self) -> f32 {
        1.0 / self.fps as f32
    }

    /// Field size as a vector
    pub fn field_size(&self) -> Vec2 {
        Vec2::new(self.field_width as f32, self.field_height as f32)
    }

    /// Field center, where the ball is placed on reset
    pub fn field_center(&self) -> Vec2 {
        self.field_size() / 2.0
    }

    /// Shortest edge the generator may place, also the minimum vertex spacing.
    /// Integer division on purpose: 56x36 gives 3.
    pub fn min_edge(&self) -> f32 {
        (self.field_width.max(self.field_height) / 16) as f32
    }

    /// Shots granted when `level` is generated
    pub fn shots_for_level(&self, level: u32) -> u32 {
        self.base_shots + level / self.shots_level_step
    }

    /// True if `p` is strictly inside the field
    pub fn in_bounds(&self, p: Vec2) -> bool {
        let size = self.field_size();
        p.x > 0.0 && p.x < size.x && p.y > 0.0 && p.y < size.y
    }
}
