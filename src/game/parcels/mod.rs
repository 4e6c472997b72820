//! Parcels: the carryable, throwable delivery objects.

pub mod coordinator;
pub mod placement;

use avian3d::prelude::*;
use bevy::prelude::*;

use crate::{
    game::{GameplaySet, player::Player, throwing::ThrowConfig},
    screens::Screen,
};

pub use coordinator::CarryCoordinator;

/// Seconds after a throw or drop during which the same parcel cannot be
/// picked up again. Stops a release from being undone by the pickup ray on
/// the very next frame.
pub const REPICKUP_GRACE: f32 = 0.5;

pub fn plugin(app: &mut App) {
    app.init_resource::<CarryCoordinator>();
    app.init_resource::<ThrowConfig>();
    app.add_systems(
        Update,
        (
            (
                register_parcels,
                unregister_parcels,
                coordinator::dispatch_carry_input,
            )
                .chain()
                .in_set(GameplaySet::Coordinate),
            position_carried_parcel.in_set(GameplaySet::Sync),
        )
            .run_if(in_state(Screen::Gameplay)),
    );
}

#[derive(Component, Debug)]
pub struct Parcel {
    /// Pickup attempts beyond this distance are ignored.
    pub pickup_radius: f32,
    /// Preferred drop distance in front of the player.
    pub drop_distance: f32,
    pub half_extents: Vec3,
    /// Hold point relative to the player origin, in the player's local frame.
    pub carry_offset: Vec3,
    pub is_carried: bool,
    last_released_at: Option<f32>,
}

impl Default for Parcel {
    fn default() -> Self {
        Self {
            pickup_radius: 2.0,
            drop_distance: 1.5,
            half_extents: Vec3::splat(0.3),
            carry_offset: Vec3::new(0.0, 1.4, -0.5),
            is_carried: false,
            last_released_at: None,
        }
    }
}

impl Parcel {
    /// Free to grab: not held by anyone and past the re-pickup grace window.
    pub fn can_pickup(&self, now: f32) -> bool {
        !self.is_carried
            && self
                .last_released_at
                .is_none_or(|released| now - released >= REPICKUP_GRACE)
    }

    pub fn mark_carried(&mut self) {
        self.is_carried = true;
    }

    pub fn mark_released(&mut self, now: f32) {
        self.is_carried = false;
        self.last_released_at = Some(now);
    }

    pub fn collider(&self) -> Collider {
        Collider::cuboid(
            self.half_extents.x * 2.0,
            self.half_extents.y * 2.0,
            self.half_extents.z * 2.0,
        )
    }
}

/// Everything a parcel needs in the world, minus visuals.
pub fn parcel_bundle(position: Vec3) -> impl Bundle {
    let parcel = Parcel::default();
    let collider = parcel.collider();
    (
        Name::new("Parcel"),
        parcel,
        RigidBody::Dynamic,
        collider,
        Transform::from_translation(position),
        Visibility::Visible,
        DespawnOnExit(Screen::Gameplay),
    )
}

fn register_parcels(
    mut coordinator: ResMut<CarryCoordinator>,
    added: Query<Entity, Added<Parcel>>,
) {
    for parcel in &added {
        coordinator.register(parcel);
    }
}

fn unregister_parcels(
    mut coordinator: ResMut<CarryCoordinator>,
    mut removed: RemovedComponents<Parcel>,
) {
    for parcel in removed.read() {
        coordinator.unregister(parcel);
    }
}

/// Pins the carried parcel to the player's hold point. Runs after the state
/// machine so it follows this frame's facing.
fn position_carried_parcel(
    coordinator: Res<CarryCoordinator>,
    players: Query<&Transform, With<Player>>,
    mut parcels: Query<(&Parcel, &mut Transform), Without<Player>>,
) {
    let Some(carried) = coordinator.carried() else {
        return;
    };
    let Ok(player) = players.single() else {
        return;
    };
    let Ok((parcel, mut transform)) = parcels.get_mut(carried) else {
        return;
    };
    transform.translation = player.translation + player.rotation * parcel.carry_offset;
    transform.rotation = player.rotation;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_parcels_are_grabbable() {
        let parcel = Parcel::default();
        assert!(parcel.can_pickup(0.0));
    }

    #[test]
    fn carried_parcels_are_not_grabbable() {
        let mut parcel = Parcel::default();
        parcel.mark_carried();
        assert!(!parcel.can_pickup(100.0));
    }

    #[test]
    fn release_opens_a_grace_window() {
        let mut parcel = Parcel::default();
        parcel.mark_carried();
        parcel.mark_released(10.0);
        assert!(!parcel.can_pickup(10.0));
        assert!(!parcel.can_pickup(10.0 + REPICKUP_GRACE * 0.9));
        assert!(parcel.can_pickup(10.0 + REPICKUP_GRACE));
    }
}
