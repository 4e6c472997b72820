//! Drop-position resolution for parcels.
//!
//! Best-effort placement heuristic, not a guaranteed collision-free solve: the
//! ideal point in front of the player is probed with a fan of rays, pulled in
//! when something blocks it, snapped to the ground below, and finally replaced
//! by a short safe offset if the result still intersects level geometry.

use avian3d::prelude::*;
use bevy::prelude::*;

/// Height above the actor's feet that probe rays are cast from.
const CHEST_HEIGHT: f32 = 0.8;
/// Fraction of an obstructed ray's hit distance that is still considered safe.
const OBSTRUCTION_SHRINK: f32 = 0.8;
/// Parcels are never dropped closer to the player than this.
const MIN_DROP_DISTANCE: f32 = 0.5;
/// The ground probe starts this far above the candidate point.
const GROUND_PROBE_RISE: f32 = 2.0;
const GROUND_PROBE_RANGE: f32 = 4.0;
/// Gap left between the ground and the parcel's lower face.
const GROUND_CLEARANCE: f32 = 0.1;
/// Forward distance of the last-resort placement in front of the player.
const FALLBACK_DISTANCE: f32 = 0.5;

/// Result of a single probe ray.
pub struct ProbeHit {
    pub distance: f32,
}

/// The slice of the environment query service that drop placement needs.
///
/// Implemented for avian spatial queries in the game and for stubs in tests.
pub trait EnvironmentProbe {
    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<ProbeHit>;
    fn volume_blocked(&self, center: Vec3, radius: f32) -> bool;
}

/// Inputs to [`resolve_drop_position`].
pub struct DropRequest {
    pub actor_position: Vec3,
    /// Unit horizontal direction the parcel is dropped towards.
    pub direction: Vec3,
    pub drop_distance: f32,
    pub half_extents: Vec3,
}

/// Computes a placement point for a released parcel. Deterministic for
/// identical inputs.
pub fn resolve_drop_position(request: &DropRequest, probe: &impl EnvironmentProbe) -> Vec3 {
    let DropRequest {
        actor_position,
        direction,
        drop_distance,
        half_extents,
    } = *request;

    let ideal = actor_position + direction * drop_distance;
    let chest = actor_position + Vec3::Y * CHEST_HEIGHT;
    // Probe targets spread over the parcel's bounding extents, rotated into
    // the drop direction.
    let facing = Quat::from_rotation_arc(Vec3::NEG_Z, direction);
    let offsets = [
        Vec3::ZERO,
        Vec3::new(0.0, half_extents.y, 0.0),
        Vec3::new(0.0, -half_extents.y, 0.0),
        Vec3::new(half_extents.x, 0.0, 0.0),
        Vec3::new(-half_extents.x, 0.0, 0.0),
        Vec3::new(0.0, 0.0, half_extents.z),
        Vec3::new(0.0, 0.0, -half_extents.z),
    ];

    let mut obstructed = false;
    let mut safest_distance = drop_distance;
    for offset in offsets {
        let target = ideal + facing * offset;
        let delta = target - chest;
        let length = delta.length();
        if length <= f32::EPSILON {
            continue;
        }
        if let Some(hit) = probe.cast_ray(chest, delta / length, length) {
            obstructed = true;
            safest_distance = safest_distance.min(hit.distance * OBSTRUCTION_SHRINK);
        }
    }

    let mut position = if obstructed {
        actor_position + direction * safest_distance.max(MIN_DROP_DISTANCE)
    } else {
        ideal
    };

    // Snap to the ground below the candidate point, if there is any.
    let probe_origin = position + Vec3::Y * GROUND_PROBE_RISE;
    match probe.cast_ray(probe_origin, Vec3::NEG_Y, GROUND_PROBE_RANGE) {
        Some(hit) => {
            let ground_y = probe_origin.y - hit.distance;
            position.y = ground_y + half_extents.y + GROUND_CLEARANCE;
        }
        None => {
            position.y = actor_position.y;
        }
    }

    // Last resort: if the point still intersects something, place the parcel
    // right in front of the player, lifted by half its height.
    let check_radius = half_extents.x.max(half_extents.z) + 0.05;
    if probe.volume_blocked(position, check_radius) {
        position = actor_position + direction * FALLBACK_DISTANCE + Vec3::Y * half_extents.y;
    }

    position
}

/// [`EnvironmentProbe`] backed by avian's spatial query pipeline.
pub struct SpatialProbe<'a, 'w, 's> {
    pub spatial: &'a SpatialQuery<'w, 's>,
    pub filter: SpatialQueryFilter,
}

impl EnvironmentProbe for SpatialProbe<'_, '_, '_> {
    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<ProbeHit> {
        let direction = Dir3::new(direction).ok()?;
        self.spatial
            .cast_ray(origin, direction, max_distance, true, &self.filter)
            .map(|hit| ProbeHit {
                distance: hit.distance,
            })
    }

    fn volume_blocked(&self, center: Vec3, radius: f32) -> bool {
        !self
            .spatial
            .shape_intersections(&Collider::sphere(radius), center, Quat::IDENTITY, &self.filter)
            .is_empty()
    }
}
