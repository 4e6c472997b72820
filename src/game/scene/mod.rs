//! Level setup for the delivery prototype.
//!
//! Gameplay entities are spawned with logic components only; small `Added`
//! systems attach primitive meshes afterwards. Headless apps that spawn the
//! same bundles get identical behavior with no render assets involved.

use avian3d::prelude::*;
use bevy::prelude::*;

use crate::{
    game::{
        delivery, parcels,
        player::{PLAYER_HEIGHT, PLAYER_RADIUS, Player, SpawnPlayer},
        traffic::{self, Car},
    },
    screens::Screen,
};

const GROUND_SIZE: f32 = 60.0;
const ZONE_RADIUS: f32 = 2.0;

pub(super) fn plugin(app: &mut App) {
    app.add_systems(OnEnter(Screen::Gameplay), spawn_level);
    app.add_systems(
        Update,
        (attach_player_visuals, attach_parcel_visuals, attach_car_visuals)
            .run_if(in_state(Screen::Gameplay)),
    );
}

fn spawn_level(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        Name::new("Sun"),
        DirectionalLight {
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(8.0, 16.0, 8.0).looking_at(Vec3::ZERO, Vec3::Y),
        DespawnOnExit(Screen::Gameplay),
    ));

    commands.spawn((
        Name::new("Ground"),
        RigidBody::Static,
        Collider::cuboid(GROUND_SIZE, 1.0, GROUND_SIZE),
        Transform::from_xyz(0.0, -0.5, 0.0),
        Mesh3d(meshes.add(Cuboid::new(GROUND_SIZE, 1.0, GROUND_SIZE))),
        MeshMaterial3d(materials.add(Color::srgb(0.35, 0.42, 0.3))),
        DespawnOnExit(Screen::Gameplay),
    ));

    // Walls near the pickup area give the drop heuristic something to avoid.
    let wall_material = materials.add(Color::srgb(0.5, 0.5, 0.55));
    for (position, size) in [
        (Vec3::new(-6.0, 1.0, -4.0), Vec3::new(0.4, 2.0, 8.0)),
        (Vec3::new(5.0, 1.0, 6.0), Vec3::new(8.0, 2.0, 0.4)),
    ] {
        commands.spawn((
            Name::new("Wall"),
            RigidBody::Static,
            Collider::cuboid(size.x, size.y, size.z),
            Transform::from_translation(position),
            Mesh3d(meshes.add(Cuboid::new(size.x, size.y, size.z))),
            MeshMaterial3d(wall_material.clone()),
            DespawnOnExit(Screen::Gameplay),
        ));
    }

    for position in [
        Vec3::new(2.0, 0.4, -3.0),
        Vec3::new(-3.0, 0.4, -5.0),
        Vec3::new(4.0, 0.4, 2.0),
    ] {
        commands.spawn(parcels::parcel_bundle(position));
    }

    // Delivery zones are visual-only discs; no collider, so they never
    // occlude pickup rays or the throw preview.
    let zone_material = materials.add(Color::srgba(0.2, 0.8, 0.4, 0.6));
    let zone_mesh = meshes.add(Cylinder::new(ZONE_RADIUS, 0.05));
    for position in [Vec3::new(-10.0, 0.05, 8.0), Vec3::new(12.0, 0.05, -6.0)] {
        commands.spawn((
            delivery::zone_bundle(position, ZONE_RADIUS),
            Mesh3d(zone_mesh.clone()),
            MeshMaterial3d(zone_material.clone()),
        ));
    }

    let mut rng = rand::rng();
    let road_loops = [
        vec![
            Vec3::new(-20.0, 0.7, -12.0),
            Vec3::new(20.0, 0.7, -12.0),
            Vec3::new(20.0, 0.7, -16.0),
            Vec3::new(-20.0, 0.7, -16.0),
        ],
        vec![
            Vec3::new(-16.0, 0.7, 12.0),
            Vec3::new(16.0, 0.7, 12.0),
            Vec3::new(16.0, 0.7, 16.0),
            Vec3::new(-16.0, 0.7, 16.0),
        ],
    ];
    for waypoints in road_loops {
        let start = waypoints[0];
        commands.spawn(traffic::car_bundle(
            Car::new(waypoints, traffic::random_speed(&mut rng)),
            start,
        ));
    }

    commands.queue(SpawnPlayer {
        position: Vec3::new(0.0, 2.0, 2.0),
    });
}

fn attach_player_visuals(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    players: Query<Entity, Added<Player>>,
) {
    for player in &players {
        let mesh = Mesh3d(meshes.add(Capsule3d::new(PLAYER_RADIUS, PLAYER_HEIGHT)));
        let material = MeshMaterial3d(materials.add(Color::srgb(0.85, 0.6, 0.2)));
        commands.entity(player).with_children(|parent| {
            parent.spawn((mesh, material));
        });
    }
}

fn attach_parcel_visuals(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    parcels: Query<(Entity, &parcels::Parcel), Added<parcels::Parcel>>,
) {
    for (entity, parcel) in &parcels {
        let size = parcel.half_extents * 2.0;
        let mesh = Mesh3d(meshes.add(Cuboid::new(size.x, size.y, size.z)));
        let material = MeshMaterial3d(materials.add(Color::srgb(0.7, 0.45, 0.2)));
        commands.entity(entity).with_children(|parent| {
            parent.spawn((mesh, material));
        });
    }
}

fn attach_car_visuals(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    cars: Query<Entity, Added<Car>>,
) {
    for car in &cars {
        let mesh = Mesh3d(meshes.add(Cuboid::new(
            traffic::CAR_WIDTH,
            traffic::CAR_HEIGHT,
            traffic::CAR_LENGTH,
        )));
        let material = MeshMaterial3d(materials.add(Color::srgb(0.75, 0.2, 0.2)));
        commands.entity(car).with_children(|parent| {
            parent.spawn((mesh, material));
        });
    }
}
