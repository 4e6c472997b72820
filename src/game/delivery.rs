//! Delivery zones: where parcels are supposed to end up.
//!
//! Zones have no colliders, so they never block probe rays or the trajectory
//! preview. A parcel counts as delivered once it rests inside a zone without
//! being carried.

use avian3d::prelude::*;
use bevy::prelude::*;

use crate::{
    game::{GameplaySet, parcels::Parcel},
    screens::Screen,
};

/// A parcel moving faster than this has not settled yet.
const SETTLED_SPEED: f32 = 0.25;

pub fn plugin(app: &mut App) {
    app.init_resource::<DeliveryScore>();
    app.add_systems(
        Update,
        resolve_deliveries
            .in_set(GameplaySet::Sync)
            .run_if(in_state(Screen::Gameplay)),
    );
}

#[derive(Component, Debug)]
pub struct DeliveryZone {
    pub radius: f32,
}

#[derive(Resource, Debug, Default)]
pub struct DeliveryScore {
    pub delivered: u32,
}

pub fn zone_bundle(position: Vec3, radius: f32) -> impl Bundle {
    (
        Name::new("Delivery Zone"),
        DeliveryZone { radius },
        Transform::from_translation(position),
        Visibility::Visible,
        DespawnOnExit(Screen::Gameplay),
    )
}

fn resolve_deliveries(
    mut commands: Commands,
    mut score: ResMut<DeliveryScore>,
    zones: Query<(&DeliveryZone, &Transform)>,
    parcels: Query<(Entity, &Parcel, &Transform, &LinearVelocity), Without<DeliveryZone>>,
) {
    for (entity, parcel, transform, velocity) in &parcels {
        if parcel.is_carried || velocity.length() > SETTLED_SPEED {
            continue;
        }
        for (zone, zone_transform) in &zones {
            let offset = transform.translation - zone_transform.translation;
            if Vec3::new(offset.x, 0.0, offset.z).length() <= zone.radius {
                commands.entity(entity).despawn();
                score.delivered += 1;
                info!("parcel {entity} delivered, {} total", score.delivered);
                break;
            }
        }
    }
}
