//! The carry coordinator: single authority over which parcel is held.
//!
//! Parcels register themselves on spawn and leave on despawn. All pickup,
//! drop and throw input funnels through [`dispatch_carry_input`], which
//! mutates ownership and asks the player state machine to switch states. The
//! state machine never touches ownership on its own, so "at most one parcel
//! is carried" holds by construction.

use avian3d::prelude::*;
use bevy::prelude::*;

use crate::game::{
    animations::AnimationParams,
    input::InputSnapshot,
    parcels::{
        Parcel,
        placement::{DropRequest, SpatialProbe, resolve_drop_position},
    },
    player::{
        EYE_HEIGHT, Player,
        states::{self, PlayerState, PlayerStateMachine, StateContext},
    },
    throwing::{self, ThrowConfig, TrajectoryPreview},
};

/// Forward shove a dropped parcel gets so it settles away from the feet.
const DROP_IMPULSE: f32 = 2.0;
/// Slack added to the line-of-sight ray so it reaches the parcel surface.
const LOS_SLACK: f32 = 0.1;

/// Registry of live parcels (in registration order, which breaks selection
/// ties) and the one currently carried, if any.
#[derive(Resource, Debug, Default)]
pub struct CarryCoordinator {
    parcels: Vec<Entity>,
    carried: Option<Entity>,
}

impl CarryCoordinator {
    /// Idempotent; re-registering keeps the original position in the order.
    pub fn register(&mut self, parcel: Entity) {
        if !self.parcels.contains(&parcel) {
            self.parcels.push(parcel);
        }
    }

    /// Idempotent. Dropping the carried parcel's registration also clears
    /// the carried slot.
    pub fn unregister(&mut self, parcel: Entity) {
        self.parcels.retain(|registered| *registered != parcel);
        if self.carried == Some(parcel) {
            self.carried = None;
        }
    }

    pub fn carried(&self) -> Option<Entity> {
        self.carried
    }

    pub fn is_carrying(&self) -> bool {
        self.carried.is_some()
    }

    pub fn parcels(&self) -> &[Entity] {
        &self.parcels
    }

    pub(crate) fn set_carried(&mut self, parcel: Entity) {
        self.carried = Some(parcel);
    }

    pub(crate) fn clear_carried(&mut self) {
        self.carried = None;
    }
}

/// Pickup candidate that passed the distance and grace filters.
pub(crate) struct PickupCandidate {
    pub entity: Entity,
    pub position: Vec3,
}

/// Picks the closest visible candidate. Strict comparison, so on an exact
/// distance tie the first candidate in iteration order (registration order)
/// wins.
pub(crate) fn select_pickup_target(
    actor: Vec3,
    candidates: &[PickupCandidate],
    mut visible: impl FnMut(&PickupCandidate) -> bool,
) -> Option<Entity> {
    let mut best: Option<(Entity, f32)> = None;
    for candidate in candidates {
        if !visible(candidate) {
            continue;
        }
        let distance = actor.distance(candidate.position);
        if best.is_none_or(|(_, best_distance)| distance < best_distance) {
            best = Some((candidate.entity, distance));
        }
    }
    best.map(|(entity, _)| entity)
}

/// Swaps a parcel back to free physics with the given launch velocity.
pub(crate) fn release_parcel(
    commands: &mut Commands,
    entity: Entity,
    parcel: &mut Parcel,
    now: f32,
    velocity: Vec3,
) {
    parcel.mark_released(now);
    commands
        .entity(entity)
        .insert((
            RigidBody::Dynamic,
            LinearVelocity(velocity),
            AngularVelocity(Vec3::ZERO),
        ))
        .remove::<ColliderDisabled>();
}

/// Routes this frame's pickup/drop/throw input to ownership changes and
/// state switches. Runs before the state machine tick.
pub fn dispatch_carry_input(
    time: Res<Time>,
    input: Res<InputSnapshot>,
    config: Res<ThrowConfig>,
    mut coordinator: ResMut<CarryCoordinator>,
    spatial: SpatialQuery,
    mut commands: Commands,
    mut players: Query<
        (
            Entity,
            &mut PlayerStateMachine,
            &mut Transform,
            &mut AnimationParams,
            &mut LinearVelocity,
            &mut TrajectoryPreview,
        ),
        With<Player>,
    >,
    mut parcels: Query<(&mut Parcel, &mut Transform), Without<Player>>,
) {
    let Ok((player, mut machine, mut transform, mut animation, mut velocity, mut preview)) =
        players.single_mut()
    else {
        return;
    };
    // No interactions while knocked down.
    if matches!(machine.state(), PlayerState::Impact { .. }) {
        return;
    }
    let now = time.elapsed_secs();

    if input.throw_released
        && let PlayerState::ThrowAim { parcel: carried, charge } = *machine.state()
    {
        if let Ok((mut parcel, mut parcel_transform)) = parcels.get_mut(carried) {
            let forward = throwing::aim_direction(&transform, input.aim_point);
            let force = throwing::charge_force(charge, &config);
            let launch = throwing::throw_direction(forward, config.upward_angle) * force;
            parcel_transform.translation = throwing::launch_origin(&transform, forward);
            release_parcel(&mut commands, carried, &mut parcel, now, launch);
            info!("threw parcel {carried} at {force:.1} m/s");
        }
        coordinator.clear_carried();
        let next = states::resume_locomotion(&input);
        let mut ctx = StateContext {
            transform: &mut transform,
            animation: &mut animation,
            velocity: &mut velocity,
            preview: &mut preview,
        };
        machine.switch_state(next, &mut ctx);
        return;
    }

    if !input.pickup_pressed {
        return;
    }
    // While aiming, the pickup button cancels the aim instead; the state
    // machine handles that transition and ownership is untouched.
    if matches!(machine.state(), PlayerState::ThrowAim { .. }) {
        return;
    }

    if let Some(carried) = coordinator.carried() {
        let Ok((mut parcel, mut parcel_transform)) = parcels.get_mut(carried) else {
            coordinator.clear_carried();
            return;
        };

        let facing = transform.forward();
        let direction = Vec3::new(facing.x, 0.0, facing.z).normalize_or(Vec3::NEG_Z);
        let mut filter = SpatialQueryFilter::default();
        filter.excluded_entities.insert(player);
        filter.excluded_entities.insert(carried);
        let probe = SpatialProbe {
            spatial: &spatial,
            filter,
        };
        let position = resolve_drop_position(
            &DropRequest {
                actor_position: transform.translation,
                direction,
                drop_distance: parcel.drop_distance,
                half_extents: parcel.half_extents,
            },
            &probe,
        );

        parcel_transform.translation = position;
        parcel_transform.rotation = transform.rotation;
        release_parcel(&mut commands, carried, &mut parcel, now, direction * DROP_IMPULSE);
        coordinator.clear_carried();

        let next = states::resume_locomotion(&input);
        let mut ctx = StateContext {
            transform: &mut transform,
            animation: &mut animation,
            velocity: &mut velocity,
            preview: &mut preview,
        };
        machine.switch_state(next, &mut ctx);
        info!("dropped parcel {carried} at {position}");
        return;
    }

    // Pickup: closest registered parcel that is in range, off grace and
    // visible from eye height.
    let mut candidates = Vec::new();
    for &entity in coordinator.parcels() {
        let Ok((parcel, parcel_transform)) = parcels.get(entity) else {
            continue;
        };
        if !parcel.can_pickup(now) {
            continue;
        }
        let position = parcel_transform.translation;
        if transform.translation.distance(position) > parcel.pickup_radius {
            continue;
        }
        candidates.push(PickupCandidate { entity, position });
    }

    let eye = transform.translation + Vec3::Y * EYE_HEIGHT;
    let mut filter = SpatialQueryFilter::default();
    filter.excluded_entities.insert(player);
    let selected = select_pickup_target(transform.translation, &candidates, |candidate| {
        let to_parcel = candidate.position - eye;
        let Ok(direction) = Dir3::new(to_parcel) else {
            // Degenerate ray means we are inside the parcel.
            return true;
        };
        spatial
            .cast_ray(eye, direction, to_parcel.length() + LOS_SLACK, true, &filter)
            .is_some_and(|hit| hit.entity == candidate.entity)
    });

    if let Some(target) = selected {
        let Ok((mut parcel, _)) = parcels.get_mut(target) else {
            return;
        };
        parcel.mark_carried();
        commands.entity(target).insert((
            RigidBody::Kinematic,
            ColliderDisabled,
            LinearVelocity(Vec3::ZERO),
            AngularVelocity(Vec3::ZERO),
        ));
        coordinator.set_carried(target);

        let next = states::resume_carry(target, &input);
        let mut ctx = StateContext {
            transform: &mut transform,
            animation: &mut animation,
            velocity: &mut velocity,
            preview: &mut preview,
        };
        machine.switch_state(next, &mut ctx);
        info!("picked up parcel {target}");
    }
}
