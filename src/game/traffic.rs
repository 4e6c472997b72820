//! Patrol traffic and the vehicle knockdown hazard.

use avian3d::prelude::*;
use bevy::prelude::*;
use rand::Rng;

use crate::{
    game::{
        GameplaySet,
        animations::AnimationParams,
        parcels::{CarryCoordinator, Parcel, coordinator::release_parcel},
        player::{
            Player,
            states::{IMPACT_RECOVERY, PlayerState, PlayerStateMachine, StateContext},
        },
        throwing::TrajectoryPreview,
    },
    screens::Screen,
};

pub const CAR_WIDTH: f32 = 1.8;
pub const CAR_HEIGHT: f32 = 1.4;
pub const CAR_LENGTH: f32 = 4.0;

/// A waypoint counts as reached within this distance.
const WAYPOINT_TOLERANCE: f32 = 0.5;
/// Horizontal distance at which a car clips the player.
const IMPACT_RADIUS: f32 = 2.0;
/// Slow brushes do not knock the player down.
const IMPACT_SPEED_THRESHOLD: f32 = 3.0;
/// Knockback force per unit of relative speed.
const KNOCKBACK_SCALE: f32 = 0.8;

pub fn plugin(app: &mut App) {
    app.add_systems(
        Update,
        (drive_cars, detect_vehicle_impacts)
            .chain()
            .in_set(GameplaySet::Coordinate)
            .run_if(in_state(Screen::Gameplay)),
    );
}

/// A vehicle looping over its waypoints.
#[derive(Component, Debug)]
pub struct Car {
    pub speed: f32,
    pub rotation_speed: f32,
    waypoints: Vec<Vec3>,
    next: usize,
}

impl Car {
    pub fn new(waypoints: Vec<Vec3>, speed: f32) -> Self {
        Self {
            speed,
            rotation_speed: 6.0,
            waypoints,
            next: 0,
        }
    }

    /// Flat direction towards the current waypoint, advancing to the next
    /// one when close enough. `None` when there is nowhere to go.
    fn steer_from(&mut self, position: Vec3) -> Option<Vec3> {
        if self.waypoints.is_empty() {
            return None;
        }
        let mut target = self.waypoints[self.next];
        let mut to_target = flat(target - position);
        if to_target.length() < WAYPOINT_TOLERANCE {
            self.next = (self.next + 1) % self.waypoints.len();
            target = self.waypoints[self.next];
            to_target = flat(target - position);
        }
        (to_target.length() >= WAYPOINT_TOLERANCE).then(|| to_target.normalize())
    }
}

/// Per-car speed jitter so the loop does not look mechanical.
pub fn random_speed(rng: &mut impl Rng) -> f32 {
    rng.random_range(6.0..10.0)
}

pub fn car_bundle(car: Car, position: Vec3) -> impl Bundle {
    (
        Name::new("Car"),
        car,
        RigidBody::Kinematic,
        Collider::cuboid(CAR_WIDTH, CAR_HEIGHT, CAR_LENGTH),
        Transform::from_translation(position),
        Visibility::Visible,
        DespawnOnExit(Screen::Gameplay),
    )
}

fn flat(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Unit knockdown direction: the full relative velocity, y component kept, so
/// a falling or launched player takes part of the hit as lift.
fn impact_direction(relative_velocity: Vec3, offset: Vec3) -> Vec3 {
    relative_velocity.normalize_or(offset.normalize_or(Vec3::X))
}

fn drive_cars(
    time: Res<Time>,
    mut cars: Query<(&mut Car, &mut Transform, &mut LinearVelocity)>,
) {
    let dt = time.delta_secs();
    for (mut car, mut transform, mut velocity) in &mut cars {
        let Some(direction) = car.steer_from(transform.translation) else {
            velocity.0 = Vec3::ZERO;
            continue;
        };
        velocity.x = direction.x * car.speed;
        velocity.z = direction.z * car.speed;
        let target_rotation = Quat::from_rotation_arc(Vec3::NEG_Z, direction);
        transform.rotation = transform
            .rotation
            .slerp(target_rotation, (car.rotation_speed * dt).min(1.0));
    }
}

/// Proximity plus relative-speed check; a hit knocks the player down and
/// jolts loose whatever they were carrying.
fn detect_vehicle_impacts(
    time: Res<Time>,
    mut commands: Commands,
    mut coordinator: ResMut<CarryCoordinator>,
    cars: Query<(&Transform, &LinearVelocity), (With<Car>, Without<Player>)>,
    mut players: Query<
        (
            &mut PlayerStateMachine,
            &mut Transform,
            &mut AnimationParams,
            &mut LinearVelocity,
            &mut TrajectoryPreview,
        ),
        (With<Player>, Without<Car>),
    >,
    mut parcels: Query<&mut Parcel>,
) {
    let Ok((mut machine, mut transform, mut animation, mut velocity, mut preview)) =
        players.single_mut()
    else {
        return;
    };
    if matches!(machine.state(), PlayerState::Impact { .. }) {
        return;
    }

    for (car_transform, car_velocity) in &cars {
        let offset = flat(transform.translation - car_transform.translation);
        if offset.length() > IMPACT_RADIUS {
            continue;
        }
        let relative_velocity = car_velocity.0 - velocity.0;
        let relative_speed = flat(relative_velocity).length();
        if relative_speed <= IMPACT_SPEED_THRESHOLD {
            continue;
        }

        let direction = impact_direction(relative_velocity, offset);
        if let Some(carried) = coordinator.carried() {
            if let Ok(mut parcel) = parcels.get_mut(carried) {
                release_parcel(
                    &mut commands,
                    carried,
                    &mut parcel,
                    time.elapsed_secs(),
                    direction * relative_speed * 0.5,
                );
            }
            coordinator.clear_carried();
        }

        let mut ctx = StateContext {
            transform: &mut transform,
            animation: &mut animation,
            velocity: &mut velocity,
            preview: &mut preview,
        };
        machine.switch_state(
            PlayerState::Impact {
                direction,
                force: relative_speed * KNOCKBACK_SCALE,
                elapsed: 0.0,
                recovery: IMPACT_RECOVERY,
            },
            &mut ctx,
        );
        info!("player hit by vehicle at {relative_speed:.1} m/s");
        break;
    }
}
