//! The player finite-state machine.
//!
//! One tagged union, one tick system. Transition rules live in the pure
//! [`next_state`] function; enter/exit side effects in [`enter_state`] and
//! [`exit_state`]. A switch requested during a tick takes effect immediately
//! via exit/enter, and the old state's behavior is never run again that frame.

use avian3d::prelude::*;
use bevy::prelude::*;
use bevy_tnua::prelude::*;

use crate::game::{
    animations::AnimationParams,
    input::InputSnapshot,
    parcels::Parcel,
    player::{FLOAT_HEIGHT, MovementController, Player},
    throwing::{self, TrajectoryPreview},
};

/// Seconds a knockdown lasts before control returns.
pub const IMPACT_RECOVERY: f32 = 0.5;
/// Vertical launch applied on impact, scaled down for mostly-horizontal hits.
const IMPACT_VERTICAL_KICK: f32 = 3.0;

/// Every behavior mode the player can be in. Carry variants keep the carried
/// parcel entity in the tag, so "carrying" cannot survive a state change by
/// accident.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerState {
    Walk,
    Run,
    Carry { parcel: Entity },
    RunningCarry { parcel: Entity },
    /// Charging a throw. `charge` is how long the throw button has been held.
    ThrowAim { parcel: Entity, charge: f32 },
    /// Knocked down by a vehicle. Control is suspended until `elapsed`
    /// reaches `recovery`.
    Impact {
        direction: Vec3,
        force: f32,
        elapsed: f32,
        recovery: f32,
    },
}

#[derive(Component, Debug)]
pub struct PlayerStateMachine {
    state: PlayerState,
}

impl Default for PlayerStateMachine {
    fn default() -> Self {
        Self {
            state: PlayerState::Walk,
        }
    }
}

impl PlayerStateMachine {
    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    /// The parcel held in any of the carry states.
    pub fn carried_parcel(&self) -> Option<Entity> {
        match self.state {
            PlayerState::Carry { parcel }
            | PlayerState::RunningCarry { parcel }
            | PlayerState::ThrowAim { parcel, .. } => Some(parcel),
            _ => None,
        }
    }

    /// Runs the old state's exit effects, installs `next`, runs its enter
    /// effects.
    pub fn switch_state(&mut self, next: PlayerState, ctx: &mut StateContext) {
        exit_state(&self.state, ctx);
        let old = std::mem::replace(&mut self.state, next);
        debug!("player state: {:?} -> {:?}", old, self.state);
        enter_state(&self.state, ctx);
    }
}

/// Mutable player data that enter/exit effects may touch.
pub struct StateContext<'a> {
    pub transform: &'a mut Transform,
    pub animation: &'a mut AnimationParams,
    pub velocity: &'a mut LinearVelocity,
    pub preview: &'a mut TrajectoryPreview,
}

/// Everything the transition rules look at.
pub struct StateInputs<'a> {
    pub input: &'a InputSnapshot,
    /// The carried parcel entity no longer exists.
    pub parcel_missing: bool,
}

/// Locomotion state matching the current movement input.
pub fn resume_locomotion(input: &InputSnapshot) -> PlayerState {
    if input.run_held && input.is_moving() {
        PlayerState::Run
    } else {
        PlayerState::Walk
    }
}

/// Carry state matching the current movement input.
pub fn resume_carry(parcel: Entity, input: &InputSnapshot) -> PlayerState {
    if input.run_held && input.is_moving() {
        PlayerState::RunningCarry { parcel }
    } else {
        PlayerState::Carry { parcel }
    }
}

/// The transition table. Returns the state to switch to, or `None` to stay.
pub fn next_state(state: &PlayerState, inputs: &StateInputs) -> Option<PlayerState> {
    let input = inputs.input;
    let running = input.run_held && input.is_moving();
    match *state {
        PlayerState::Walk => running.then_some(PlayerState::Run),
        PlayerState::Run => (!running).then_some(PlayerState::Walk),
        PlayerState::Carry { parcel } => {
            if inputs.parcel_missing {
                return Some(PlayerState::Walk);
            }
            if input.throw_pressed {
                return Some(PlayerState::ThrowAim { parcel, charge: 0.0 });
            }
            running.then_some(PlayerState::RunningCarry { parcel })
        }
        PlayerState::RunningCarry { parcel } => {
            if inputs.parcel_missing {
                return Some(PlayerState::Walk);
            }
            if input.throw_pressed {
                return Some(PlayerState::ThrowAim { parcel, charge: 0.0 });
            }
            (!running).then_some(PlayerState::Carry { parcel })
        }
        PlayerState::ThrowAim { parcel, .. } => {
            if inputs.parcel_missing {
                return Some(PlayerState::Walk);
            }
            // Pickup input cancels the aim and keeps the parcel.
            input.pickup_pressed.then(|| resume_carry(parcel, input))
        }
        PlayerState::Impact { elapsed, recovery, .. } => {
            (elapsed >= recovery).then_some(PlayerState::Walk)
        }
    }
}

fn enter_state(state: &PlayerState, ctx: &mut StateContext) {
    match *state {
        PlayerState::Carry { .. } | PlayerState::RunningCarry { .. } => {
            ctx.animation.set_carrying(true);
        }
        PlayerState::ThrowAim { .. } => {
            ctx.animation.set_carrying(true);
            ctx.animation.set_aiming(true);
        }
        PlayerState::Impact { direction, .. } => {
            ctx.animation.set_knocked_down(true);
            // The upward share of the hit becomes lift; a flat hit stays
            // grounded.
            let horizontal = Vec3::new(direction.x, 0.0, direction.z).length();
            ctx.velocity.y += IMPACT_VERTICAL_KICK * (1.0 - horizontal).clamp(0.0, 1.0);
        }
        PlayerState::Walk | PlayerState::Run => {}
    }
}

fn exit_state(state: &PlayerState, ctx: &mut StateContext) {
    match state {
        PlayerState::Carry { .. } | PlayerState::RunningCarry { .. } => {
            ctx.animation.set_carrying(false);
        }
        PlayerState::ThrowAim { .. } => {
            ctx.animation.set_carrying(false);
            ctx.animation.set_aiming(false);
            ctx.preview.clear();
        }
        PlayerState::Impact { .. } => {
            ctx.animation.set_knocked_down(false);
            // Stand back up: keep the yaw, zero the tumble.
            let (yaw, _, _) = ctx.transform.rotation.to_euler(EulerRot::YXZ);
            ctx.transform.rotation = Quat::from_rotation_y(yaw);
        }
        PlayerState::Walk | PlayerState::Run => {}
    }
}

/// Advances the active state's timers, applies at most one transition, then
/// runs the (possibly new) state's per-frame behavior.
pub fn tick_player_state(
    time: Res<Time>,
    input: Res<InputSnapshot>,
    parcels: Query<(), With<Parcel>>,
    mut query: Query<
        (
            &mut PlayerStateMachine,
            &mut Transform,
            &mut TnuaController,
            &MovementController,
            &mut AnimationParams,
            &mut LinearVelocity,
            &mut TrajectoryPreview,
        ),
        With<Player>,
    >,
) {
    let dt = time.delta_secs();
    for (mut machine, mut transform, mut controller, movement, mut animation, mut velocity, mut preview) in
        &mut query
    {
        advance_timers(&mut machine.state, &input, dt);

        let parcel_missing = machine
            .carried_parcel()
            .is_some_and(|parcel| parcels.get(parcel).is_err());
        let inputs = StateInputs {
            input: &input,
            parcel_missing,
        };
        if let Some(next) = next_state(&machine.state, &inputs) {
            let mut ctx = StateContext {
                transform: &mut transform,
                animation: &mut animation,
                velocity: &mut velocity,
                preview: &mut preview,
            };
            machine.switch_state(next, &mut ctx);
        }

        drive_state(
            &machine.state,
            &input,
            movement,
            &mut controller,
            &mut animation,
            &mut transform,
            dt,
        );
    }
}

fn advance_timers(state: &mut PlayerState, input: &InputSnapshot, dt: f32) {
    match state {
        PlayerState::ThrowAim { charge, .. } if input.throw_held => *charge += dt,
        PlayerState::Impact { elapsed, .. } => *elapsed += dt,
        _ => {}
    }
}

/// Per-frame behavior of the active state: what velocity to ask the movement
/// backend for, where to face, and what the animation layer should see.
fn drive_state(
    state: &PlayerState,
    input: &InputSnapshot,
    movement: &MovementController,
    controller: &mut TnuaController,
    animation: &mut AnimationParams,
    transform: &mut Transform,
    dt: f32,
) {
    let direction = input.movement_direction();
    // Airborne frames blend the locomotion clips back towards idle.
    let moving = input.is_moving() && movement.is_grounded;
    match *state {
        PlayerState::Walk => {
            feed_walk_basis(controller, direction * movement.walk_speed, Some(direction));
            animation.damp_locomotion_speed(if moving { 1.0 } else { 0.0 }, dt);
        }
        PlayerState::Run => {
            feed_walk_basis(controller, direction * movement.run_speed(), Some(direction));
            animation.damp_locomotion_speed(if moving { 2.0 } else { 0.0 }, dt);
        }
        PlayerState::Carry { .. } => {
            feed_walk_basis(controller, direction * movement.walk_speed, Some(direction));
            animation.damp_locomotion_speed(if moving { 1.0 } else { 0.0 }, dt);
        }
        PlayerState::RunningCarry { .. } => {
            feed_walk_basis(
                controller,
                direction * movement.carry_run_speed(),
                Some(direction),
            );
            animation.damp_locomotion_speed(if moving { 2.0 } else { 0.0 }, dt);
        }
        PlayerState::ThrowAim { .. } => {
            // Planted feet, instant facing towards the aim point.
            feed_walk_basis(controller, Vec3::ZERO, None);
            let aim = throwing::aim_direction(transform, input.aim_point);
            transform.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, aim);
            animation.damp_locomotion_speed(0.0, dt);
        }
        PlayerState::Impact {
            direction,
            force,
            elapsed,
            recovery,
        } => {
            // Movement input is ignored; the knockback decays to zero over
            // the recovery window. Only the flat part goes to the walk basis,
            // the vertical share was spent on the entry kick.
            let falloff = (1.0 - elapsed / recovery).max(0.0);
            let knockback = Vec3::new(direction.x, 0.0, direction.z) * force * falloff;
            feed_walk_basis(controller, knockback, None);
            animation.damp_locomotion_speed(0.0, dt);
        }
    }
}

fn feed_walk_basis(controller: &mut TnuaController, desired_velocity: Vec3, face: Option<Vec3>) {
    controller.basis(TnuaBuiltinWalk {
        desired_velocity,
        desired_forward: face.and_then(|direction| Dir3::new(direction).ok()),
        float_height: FLOAT_HEIGHT,
        ..Default::default()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARCEL: Entity = Entity::PLACEHOLDER;

    fn idle_input() -> InputSnapshot {
        InputSnapshot::default()
    }

    fn sprint_input() -> InputSnapshot {
        InputSnapshot {
            movement: Vec2::new(0.0, -1.0),
            run_held: true,
            ..default()
        }
    }

    fn transition(state: PlayerState, input: &InputSnapshot) -> Option<PlayerState> {
        next_state(
            &state,
            &StateInputs {
                input,
                parcel_missing: false,
            },
        )
    }

    #[test]
    fn walk_and_run_follow_the_sprint_input() {
        assert_eq!(
            transition(PlayerState::Walk, &sprint_input()),
            Some(PlayerState::Run)
        );
        assert_eq!(transition(PlayerState::Walk, &idle_input()), None);
        assert_eq!(
            transition(PlayerState::Run, &idle_input()),
            Some(PlayerState::Walk)
        );
        // Holding shift while standing still is not running.
        let shift_only = InputSnapshot {
            run_held: true,
            ..default()
        };
        assert_eq!(
            transition(PlayerState::Run, &shift_only),
            Some(PlayerState::Walk)
        );
    }

    #[test]
    fn carry_states_mirror_the_locomotion_pair() {
        assert_eq!(
            transition(PlayerState::Carry { parcel: PARCEL }, &sprint_input()),
            Some(PlayerState::RunningCarry { parcel: PARCEL })
        );
        assert_eq!(
            transition(PlayerState::RunningCarry { parcel: PARCEL }, &idle_input()),
            Some(PlayerState::Carry { parcel: PARCEL })
        );
    }

    #[test]
    fn throw_press_enters_aim_from_either_carry_state() {
        let input = InputSnapshot {
            throw_pressed: true,
            ..default()
        };
        assert_eq!(
            transition(PlayerState::Carry { parcel: PARCEL }, &input),
            Some(PlayerState::ThrowAim {
                parcel: PARCEL,
                charge: 0.0
            })
        );
        assert_eq!(
            transition(PlayerState::RunningCarry { parcel: PARCEL }, &input),
            Some(PlayerState::ThrowAim {
                parcel: PARCEL,
                charge: 0.0
            })
        );
    }

    #[test]
    fn cancelling_an_aim_resumes_the_matching_carry_state() {
        let cancel_idle = InputSnapshot {
            pickup_pressed: true,
            ..default()
        };
        assert_eq!(
            transition(
                PlayerState::ThrowAim {
                    parcel: PARCEL,
                    charge: 1.2
                },
                &cancel_idle
            ),
            Some(PlayerState::Carry { parcel: PARCEL })
        );

        let cancel_sprinting = InputSnapshot {
            pickup_pressed: true,
            ..sprint_input()
        };
        assert_eq!(
            transition(
                PlayerState::ThrowAim {
                    parcel: PARCEL,
                    charge: 1.2
                },
                &cancel_sprinting
            ),
            Some(PlayerState::RunningCarry { parcel: PARCEL })
        );
    }

    #[test]
    fn a_vanished_parcel_drops_back_to_walk() {
        let inputs = StateInputs {
            input: &idle_input(),
            parcel_missing: true,
        };
        for state in [
            PlayerState::Carry { parcel: PARCEL },
            PlayerState::RunningCarry { parcel: PARCEL },
            PlayerState::ThrowAim {
                parcel: PARCEL,
                charge: 0.4,
            },
        ] {
            assert_eq!(next_state(&state, &inputs), Some(PlayerState::Walk));
        }
    }

    #[test]
    fn impact_ends_only_after_the_recovery_window() {
        let mid_recovery = PlayerState::Impact {
            direction: Vec3::X,
            force: 6.0,
            elapsed: 0.3,
            recovery: IMPACT_RECOVERY,
        };
        assert_eq!(transition(mid_recovery, &sprint_input()), None);

        let recovered = PlayerState::Impact {
            direction: Vec3::X,
            force: 6.0,
            elapsed: 0.5,
            recovery: IMPACT_RECOVERY,
        };
        assert_eq!(transition(recovered, &idle_input()), Some(PlayerState::Walk));
    }

    #[test]
    fn leaving_impact_restores_an_upright_pose() {
        let mut transform =
            Transform::from_rotation(Quat::from_euler(EulerRot::YXZ, 1.2, 0.7, -0.4));
        let mut animation = AnimationParams::default();
        let mut velocity = LinearVelocity(Vec3::ZERO);
        let mut preview = TrajectoryPreview::default();
        let mut ctx = StateContext {
            transform: &mut transform,
            animation: &mut animation,
            velocity: &mut velocity,
            preview: &mut preview,
        };

        let mut machine = PlayerStateMachine {
            state: PlayerState::Impact {
                direction: Vec3::X,
                force: 6.0,
                elapsed: 0.5,
                recovery: IMPACT_RECOVERY,
            },
        };
        machine.switch_state(PlayerState::Walk, &mut ctx);

        let (yaw, pitch, roll) = transform.rotation.to_euler(EulerRot::YXZ);
        assert!((yaw - 1.2).abs() < 1e-4);
        assert!(pitch.abs() < 1e-4);
        assert!(roll.abs() < 1e-4);
    }

    #[test]
    fn switching_carry_states_keeps_the_animation_flags_in_step() {
        let mut transform = Transform::default();
        let mut animation = AnimationParams::default();
        let mut velocity = LinearVelocity(Vec3::ZERO);
        let mut preview = TrajectoryPreview {
            points: vec![Vec3::ZERO, Vec3::X],
        };
        let mut ctx = StateContext {
            transform: &mut transform,
            animation: &mut animation,
            velocity: &mut velocity,
            preview: &mut preview,
        };

        let mut machine = PlayerStateMachine::default();
        machine.switch_state(PlayerState::Carry { parcel: PARCEL }, &mut ctx);
        assert!(ctx.animation.carrying());

        machine.switch_state(
            PlayerState::ThrowAim {
                parcel: PARCEL,
                charge: 0.0,
            },
            &mut ctx,
        );
        assert!(ctx.animation.carrying());
        assert!(ctx.animation.aiming());

        machine.switch_state(PlayerState::Walk, &mut ctx);
        assert!(!ctx.animation.carrying());
        assert!(!ctx.animation.aiming());
        assert!(ctx.preview.points.is_empty());
    }

    #[test]
    fn hits_with_an_upward_share_kick_the_player_into_the_air() {
        let mut kick_for = |direction: Vec3| {
            let mut transform = Transform::default();
            let mut animation = AnimationParams::default();
            let mut velocity = LinearVelocity(Vec3::ZERO);
            let mut preview = TrajectoryPreview::default();
            let mut ctx = StateContext {
                transform: &mut transform,
                animation: &mut animation,
                velocity: &mut velocity,
                preview: &mut preview,
            };
            let mut machine = PlayerStateMachine::default();
            machine.switch_state(
                PlayerState::Impact {
                    direction,
                    force: 6.0,
                    elapsed: 0.0,
                    recovery: IMPACT_RECOVERY,
                },
                &mut ctx,
            );
            velocity.y
        };

        // Unit directions, as the impact detection produces them. The kick
        // scales with how much of the hit points off the ground plane.
        let lifted = kick_for(Vec3::new(0.0, 0.6, -0.8));
        let flat = kick_for(Vec3::NEG_Z);
        assert!(lifted > 0.0);
        assert!((lifted - IMPACT_VERTICAL_KICK * 0.2).abs() < 1e-4);
        assert_eq!(flat, 0.0);
    }
}
