//! Gameplay: the player state machine, parcel carrying and the level hazards.

pub mod animations;
mod camera_controller;
pub mod delivery;
pub mod input;
pub mod parcels;
pub mod player;
mod scene;
pub mod throwing;
pub mod traffic;

use bevy::prelude::*;

use crate::AppSystems;

pub(super) fn plugin(app: &mut App) {
    configure_gameplay_sets(app);
    app.add_plugins((
        input::plugin,
        player::plugin,
        animations::plugin,
        parcels::plugin,
        throwing::plugin,
        traffic::plugin,
        delivery::plugin,
        scene::plugin,
        camera_controller::plugin,
    ));
}

/// Ordering inside the gameplay part of the frame. Input dispatch and hazard
/// checks may switch the player state, so they run before the state machine
/// tick; carried-object placement and previews read the settled state last.
#[derive(SystemSet, Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum GameplaySet {
    /// Carry coordinator dispatch and vehicle impact detection.
    Coordinate,
    /// The player state machine tick.
    StateMachine,
    /// Systems that follow the settled state: carried-parcel placement,
    /// trajectory previews, delivery checks.
    Sync,
}

/// Also called by headless test apps that skip the full game plugin.
pub fn configure_gameplay_sets(app: &mut App) {
    app.configure_sets(
        Update,
        (
            GameplaySet::Coordinate,
            GameplaySet::StateMachine,
            GameplaySet::Sync,
        )
            .chain()
            .in_set(AppSystems::Update),
    );
}
