//! Charged parcel throws and the ballistic trajectory preview.
//!
//! The math lives in free functions so it can be exercised without an app:
//! [`charge_force`], [`throw_direction`], [`sample_trajectory`] and
//! [`truncate_at_hit`]. The systems here only feed them world data and draw
//! the result.

use avian3d::prelude::*;
use bevy::prelude::*;

use crate::{
    game::{
        GameplaySet,
        input::InputSnapshot,
        player::{
            Player,
            states::{PlayerState, PlayerStateMachine},
        },
    },
    screens::Screen,
};

/// Number of points sampled along the preview arc.
pub const TRAJECTORY_SAMPLES: usize = 30;
/// Simulated time between consecutive samples, in seconds.
pub const TRAJECTORY_TIME_STEP: f32 = 0.05;

/// Height above the player's feet the parcel is launched from.
const LAUNCH_HEIGHT: f32 = 1.5;
/// Forward offset of the launch point, so the parcel clears the body.
const LAUNCH_FORWARD: f32 = 0.5;

const PREVIEW_COLOR: Color = Color::srgb(0.9, 0.9, 0.2);
const IMPACT_MARKER_COLOR: Color = Color::srgb(0.2, 0.9, 0.3);

pub fn plugin(app: &mut App) {
    app.init_resource::<ThrowConfig>();
    app.add_systems(
        Update,
        (update_trajectory_preview, draw_trajectory_preview)
            .chain()
            .in_set(GameplaySet::Sync)
            .run_if(in_state(Screen::Gameplay)),
    );
}

/// Throw tuning shared by the charge accumulation, the release impulse and
/// the preview.
#[derive(Resource, Debug, Clone)]
pub struct ThrowConfig {
    pub min_force: f32,
    pub max_force: f32,
    /// Seconds of holding the throw button needed to reach `max_force`.
    pub charge_time: f32,
    /// Upward tilt applied to the throw direction, in degrees.
    pub upward_angle: f32,
}

impl Default for ThrowConfig {
    fn default() -> Self {
        Self {
            min_force: 5.0,
            max_force: 30.0,
            charge_time: 2.0,
            upward_angle: 20.0,
        }
    }
}

/// Launch speed for a charge that has been held for `charge` seconds.
/// Interpolates from `min_force` to `max_force` and clamps at full charge.
pub fn charge_force(charge: f32, config: &ThrowConfig) -> f32 {
    let t = if config.charge_time <= f32::EPSILON {
        1.0
    } else {
        (charge / config.charge_time).clamp(0.0, 1.0)
    };
    config.min_force + (config.max_force - config.min_force) * t
}

/// Tilts a flat facing direction upwards by `upward_angle_deg`.
pub fn throw_direction(flat_forward: Vec3, upward_angle_deg: f32) -> Vec3 {
    let forward = flat_forward.normalize_or(Vec3::NEG_Z);
    let right = forward.cross(Vec3::Y).normalize_or(Vec3::X);
    Quat::from_axis_angle(right, upward_angle_deg.to_radians()) * forward
}

/// World point the parcel is released from.
pub fn launch_origin(player: &Transform, flat_forward: Vec3) -> Vec3 {
    player.translation + Vec3::Y * LAUNCH_HEIGHT + flat_forward * LAUNCH_FORWARD
}

/// Samples the ballistic arc `p(t) = p0 + v*t + g*t^2/2` at fixed intervals.
pub fn sample_trajectory(
    origin: Vec3,
    velocity: Vec3,
    gravity: Vec3,
    samples: usize,
    time_step: f32,
) -> Vec<Vec3> {
    (0..samples)
        .map(|i| {
            let t = i as f32 * time_step;
            origin + velocity * t + 0.5 * gravity * t * t
        })
        .collect()
}

/// Walks the sampled arc segment by segment and clamps it at the first
/// obstruction: every point past the hit collapses onto the hit point, so the
/// preview visibly ends there. Returns the hit point, if any.
pub fn truncate_at_hit(
    points: &mut [Vec3],
    mut linecast: impl FnMut(Vec3, Vec3) -> Option<Vec3>,
) -> Option<Vec3> {
    for i in 1..points.len() {
        if let Some(hit) = linecast(points[i - 1], points[i]) {
            for point in &mut points[i..] {
                *point = hit;
            }
            return Some(hit);
        }
    }
    None
}

/// Polyline of the current aim arc. Empty whenever the player is not aiming.
#[derive(Component, Debug, Default)]
pub struct TrajectoryPreview {
    pub points: Vec<Vec3>,
}

impl TrajectoryPreview {
    pub fn clear(&mut self) {
        self.points.clear();
    }
}

fn update_trajectory_preview(
    input: Res<InputSnapshot>,
    config: Res<ThrowConfig>,
    gravity: Res<Gravity>,
    spatial: SpatialQuery,
    mut players: Query<
        (Entity, &PlayerStateMachine, &Transform, &mut TrajectoryPreview),
        With<Player>,
    >,
) {
    for (player, machine, transform, mut preview) in &mut players {
        let PlayerState::ThrowAim { parcel, charge } = *machine.state() else {
            preview.clear();
            continue;
        };

        let forward = aim_direction(transform, input.aim_point);
        let velocity = throw_direction(forward, config.upward_angle) * charge_force(charge, &config);
        let origin = launch_origin(transform, forward);

        let mut filter = SpatialQueryFilter::default();
        filter.excluded_entities.insert(player);
        filter.excluded_entities.insert(parcel);

        let mut points = sample_trajectory(
            origin,
            velocity,
            gravity.0,
            TRAJECTORY_SAMPLES,
            TRAJECTORY_TIME_STEP,
        );
        truncate_at_hit(&mut points, |from, to| {
            let delta = to - from;
            let length = delta.length();
            let direction = Dir3::new(delta).ok()?;
            spatial
                .cast_ray(from, direction, length, true, &filter)
                .map(|hit| from + *direction * hit.distance)
        });
        preview.points = points;
    }
}

/// Flat direction towards the cursor's ground point, or the player's facing
/// when there is no usable cursor.
pub fn aim_direction(player: &Transform, aim_point: Option<Vec3>) -> Vec3 {
    let facing = player.forward();
    let fallback = Vec3::new(facing.x, 0.0, facing.z).normalize_or(Vec3::NEG_Z);
    let Some(aim) = aim_point else {
        return fallback;
    };
    let to_aim = Vec3::new(
        aim.x - player.translation.x,
        0.0,
        aim.z - player.translation.z,
    );
    to_aim.normalize_or(fallback)
}

fn draw_trajectory_preview(mut gizmos: Gizmos, previews: Query<&TrajectoryPreview>) {
    for preview in &previews {
        if preview.points.len() < 2 {
            continue;
        }
        gizmos.linestrip(preview.points.iter().copied(), PREVIEW_COLOR);
        if let Some(last) = preview.points.last() {
            gizmos.sphere(Isometry3d::from_translation(*last), 0.15, IMPACT_MARKER_COLOR);
        }
    }
}
