//! Animation layer.
//!
//! Gameplay writes [`AnimationParams`]; this module resolves them into an
//! [`AnimationState`] once per frame. Keeping the seam here means the state
//! machine and coordinator never depend on how the character is animated.

mod animation_controller;
mod models;

use bevy::prelude::*;

pub use models::{AnimationParams, AnimationState};

use crate::{game::GameplaySet, screens::Screen};

pub fn plugin(app: &mut App) {
    app.add_systems(
        Update,
        animation_controller::update_animation_state
            .in_set(GameplaySet::Sync)
            .run_if(in_state(Screen::Gameplay)),
    );
}
