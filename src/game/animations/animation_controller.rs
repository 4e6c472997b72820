use bevy::prelude::*;
use bevy_tnua::{TnuaAnimatingState, TnuaAnimatingStateDirective};

use crate::game::player::Player;

use super::models::{AnimationParams, AnimationState};

/// Below this locomotion speed the character counts as standing still.
const IDLE_THRESHOLD: f32 = 0.1;
/// Above this locomotion speed the run clip takes over from the walk clip.
const RUN_THRESHOLD: f32 = 1.5;

/// Resolves [`AnimationParams`] into an [`AnimationState`] and reacts to
/// variant changes. Clip playback for the primitive-mesh prototype is a log
/// line; a rigged character would start its transitions here.
pub fn update_animation_state(
    mut query: Query<(&AnimationParams, &mut TnuaAnimatingState<AnimationState>), With<Player>>,
) {
    for (params, mut animating_state) in &mut query {
        let new_state = determine_animation_state(params);
        match animating_state.update_by_discriminant(new_state) {
            TnuaAnimatingStateDirective::Maintain { .. } => {
                // Same variant. Speed changes inside `Running` feed blend
                // weights and need no clip switch.
            }
            TnuaAnimatingStateDirective::Alter { old_state, state } => {
                debug!("animation state: {:?} -> {:?}", old_state, state);
            }
        }
    }
}

/// Pure mapping from the parameter sink to an animation state.
pub fn determine_animation_state(params: &AnimationParams) -> AnimationState {
    if params.knocked_down() {
        return AnimationState::Knockdown;
    }
    if params.aiming() {
        return AnimationState::Aiming;
    }

    let speed = params.locomotion_speed();
    if params.carrying() {
        if speed < IDLE_THRESHOLD {
            AnimationState::CarryIdle
        } else if speed <= RUN_THRESHOLD {
            AnimationState::CarryWalking
        } else {
            AnimationState::CarryRunning(speed)
        }
    } else if speed < IDLE_THRESHOLD {
        AnimationState::Idle
    } else if speed <= RUN_THRESHOLD {
        AnimationState::Walking
    } else {
        AnimationState::Running(speed)
    }
}
