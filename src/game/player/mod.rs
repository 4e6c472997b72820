pub mod states;

use avian3d::prelude::*;
use bevy::prelude::*;
use bevy_tnua::{TnuaAnimatingState, prelude::*};
use bevy_tnua_avian3d::*;

use crate::{
    game::{
        GameplaySet,
        animations::{AnimationParams, AnimationState},
        throwing::TrajectoryPreview,
    },
    screens::Screen,
};

pub use states::{PlayerState, PlayerStateMachine};

// Player marker component
#[derive(Component)]
pub struct Player;

/// Locomotion tuning plus the grounded flag kept fresh by a downward probe.
#[derive(Component)]
pub struct MovementController {
    pub walk_speed: f32,
    pub run_multiplier: f32,
    /// Sprinting with a parcel only gives a slight boost over walking.
    pub carry_run_multiplier: f32,
    pub is_grounded: bool,
}

impl Default for MovementController {
    fn default() -> Self {
        Self {
            walk_speed: 4.0,
            run_multiplier: 2.0,
            carry_run_multiplier: 1.1,
            is_grounded: false,
        }
    }
}

impl MovementController {
    pub fn run_speed(&self) -> f32 {
        self.walk_speed * self.run_multiplier
    }

    pub fn carry_run_speed(&self) -> f32 {
        self.walk_speed * self.carry_run_multiplier
    }
}

// Constants
pub const PLAYER_HEIGHT: f32 = 1.1;
pub const PLAYER_RADIUS: f32 = 0.4;
/// Ride height the movement backend keeps the capsule floating at.
pub const FLOAT_HEIGHT: f32 = 0.8;
/// Eye height that pickup line-of-sight rays are cast from.
pub const EYE_HEIGHT: f32 = 1.6;

const GROUND_PROBE_MARGIN: f32 = 0.3;

// Player spawn command
pub struct SpawnPlayer {
    pub position: Vec3,
}

impl Command for SpawnPlayer {
    fn apply(self, world: &mut World) {
        let _ = world.run_system_cached_with(spawn_player, self);
    }
}

fn spawn_player(In(spawn_config): In<SpawnPlayer>, mut commands: Commands) {
    commands
        .spawn((
            Name::new("Player"),
            Player,
            MovementController::default(),
            PlayerStateMachine::default(),
            DespawnOnExit(Screen::Gameplay),
            Transform::from_translation(spawn_config.position),
            Visibility::Visible,
            // Avian3D physics components
            RigidBody::Dynamic,
            Collider::capsule(PLAYER_RADIUS, PLAYER_HEIGHT),
            TnuaController::default(),
            LockedAxes::ROTATION_LOCKED.unlock_rotation_y(), // Prevent player from tipping over
            TnuaAvian3dSensorShape(Collider::cylinder(PLAYER_RADIUS - 0.05, 0.0)),
        ))
        .insert((
            AnimationParams::default(),
            TnuaAnimatingState::<AnimationState>::default(),
            TrajectoryPreview::default(),
        ));
}

pub fn plugin(app: &mut App) {
    // Tnua controller plugins
    app.add_plugins((
        TnuaControllerPlugin::new(FixedUpdate),
        TnuaAvian3dPlugin::new(FixedUpdate),
    ));

    app.add_systems(
        Update,
        (
            states::tick_player_state.in_set(GameplaySet::StateMachine),
            update_grounded.in_set(GameplaySet::Sync),
        )
            .run_if(in_state(Screen::Gameplay)),
    );
}

/// Short downward ray from the capsule center; within float height plus a
/// margin counts as standing on something.
fn update_grounded(
    spatial: SpatialQuery,
    mut players: Query<(Entity, &Transform, &mut MovementController), With<Player>>,
) {
    for (entity, transform, mut controller) in &mut players {
        let mut filter = SpatialQueryFilter::default();
        filter.excluded_entities.insert(entity);
        controller.is_grounded = spatial
            .cast_ray(
                transform.translation,
                Dir3::NEG_Y,
                FLOAT_HEIGHT + GROUND_PROBE_MARGIN,
                true,
                &filter,
            )
            .is_some();
    }
}
