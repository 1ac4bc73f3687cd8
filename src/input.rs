//! Presenter input mapped to game actions
//!
//! Presenters report raw events in screen pixels; [`map_input`] turns them
//! into the handful of actions the game understands, based on the latest
//! snapshot.

use glam::Vec2;

use crate::consts::SCALE;
use crate::sim::Snapshot;

/// Raw input from a presenter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Pointer pressed at screen pixel coordinates
    PointerPressed { x: f32, y: f32 },
    KeyTyped(char),
}

/// What the game should do in response to input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Launch the ball along this (unnormalized) direction
    Shoot(Vec2),
    Reset,
    Generate,
}

/// Convert screen pixels to field units
#[inline]
pub fn screen_to_field(x: f32, y: f32, scale: f32) -> Vec2 {
    Vec2::new(x / scale, y / scale)
}

/// Convert field units to screen pixels
#[inline]
pub fn field_to_screen(p: Vec2, scale: f32) -> (f32, f32) {
    (p.x * scale, p.y * scale)
}

pub fn map_input(event: &InputEvent, snapshot: &Snapshot) -> Option<Action> {
    match *event {
        InputEvent::PointerPressed { x, y } => {
            if snapshot.game_over {
                Some(Action::Reset)
            } else if snapshot.ball.stopped {
                let target = screen_to_field(x, y, SCALE);
                Some(Action::Shoot(target - snapshot.ball.position))
            } else {
                None
            }
        }
        InputEvent::KeyTyped('g') => Some(Action::Generate),
        InputEvent::KeyTyped('r') => Some(Action::Reset),
        InputEvent::KeyTyped(_) => None,
    }
}
