//! End-to-end carry protocol tests over a headless app.
//!
//! The app runs with `MinimalPlugins` plus physics and the gameplay logic
//! plugins; rendering, input devices and the scene are absent. Tests drive
//! the game through the input snapshot the way the real input systems would.

use std::time::Duration;

use avian3d::prelude::*;
use bevy::{prelude::*, state::app::StatesPlugin};
use rand::{Rng, SeedableRng, rngs::StdRng};
use parcel_rush::{
    game::{
        self,
        delivery::{self, DeliveryScore},
        input::InputSnapshot,
        parcels::{CarryCoordinator, Parcel, parcel_bundle},
        player::{Player, PlayerState, PlayerStateMachine, SpawnPlayer},
        traffic::{Car, car_bundle},
    },
    screens::Screen,
};

fn test_app() -> App {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, TransformPlugin, StatesPlugin));
    // Avian's collider backend reads `AssetEvent<Mesh>` and `SceneSpawner`,
    // so the headless app still needs the asset and scene plumbing.
    app.add_plugins((AssetPlugin::default(), bevy::scene::ScenePlugin));
    app.init_asset::<Mesh>();
    app.insert_state(Screen::Gameplay);
    app.add_plugins(PhysicsPlugins::default());
    app.init_resource::<InputSnapshot>();
    game::configure_gameplay_sets(&mut app);
    app.add_plugins((
        game::player::plugin,
        game::animations::plugin,
        game::parcels::plugin,
        game::traffic::plugin,
        game::delivery::plugin,
    ));

    // `App::update` alone never runs plugin `finish`/`cleanup` hooks, which
    // avian relies on to insert its diagnostics resources.
    app.finish();
    app.cleanup();

    // Flat ground for the player to stand on and parcels to rest on.
    app.world_mut().spawn((
        Name::new("Ground"),
        RigidBody::Static,
        Collider::cuboid(40.0, 1.0, 40.0),
        Transform::from_xyz(0.0, -0.5, 0.0),
    ));
    app
}

/// One frame with enough wall time for the fixed physics step to run.
fn step(app: &mut App) {
    std::thread::sleep(Duration::from_millis(20));
    app.update();
}

fn settle(app: &mut App, frames: usize) {
    for _ in 0..frames {
        step(app);
    }
}

fn input_mut(app: &mut App) -> Mut<'_, InputSnapshot> {
    app.world_mut().resource_mut::<InputSnapshot>()
}

fn clear_edges(app: &mut App) {
    let mut input = input_mut(app);
    input.pickup_pressed = false;
    input.throw_pressed = false;
    input.throw_released = false;
}

fn press_pickup(app: &mut App) {
    input_mut(app).pickup_pressed = true;
    step(app);
    clear_edges(app);
}

fn player_entity(app: &mut App) -> Entity {
    let world = app.world_mut();
    let mut query = world.query_filtered::<Entity, With<Player>>();
    query.single(world).unwrap()
}

fn player_state(app: &App, player: Entity) -> PlayerState {
    *app.world().get::<PlayerStateMachine>(player).unwrap().state()
}

fn carried(app: &App) -> Option<Entity> {
    app.world().resource::<CarryCoordinator>().carried()
}

fn step_until(
    app: &mut App,
    max_frames: usize,
    mut done: impl FnMut(&App) -> bool,
) -> bool {
    for _ in 0..max_frames {
        if done(app) {
            return true;
        }
        step(app);
    }
    done(app)
}

#[test]
fn pickup_carry_aim_throw_flow() {
    let mut app = test_app();
    SpawnPlayer {
        position: Vec3::new(0.0, 1.0, 0.0),
    }
    .apply(app.world_mut());
    let parcel = app
        .world_mut()
        .spawn(parcel_bundle(Vec3::new(0.0, 0.3, -1.5)))
        .id();
    settle(&mut app, 10);
    let player = player_entity(&mut app);
    assert_eq!(player_state(&app, player), PlayerState::Walk);

    // Pickup: ownership moves to the coordinator, physics is suspended.
    press_pickup(&mut app);
    assert_eq!(player_state(&app, player), PlayerState::Carry { parcel });
    assert_eq!(carried(&app), Some(parcel));
    assert!(app.world().get::<Parcel>(parcel).unwrap().is_carried);
    assert!(app.world().get::<ColliderDisabled>(parcel).is_some());

    // The carried parcel rides the player's hold point.
    settle(&mut app, 2);
    let player_pos = app.world().get::<Transform>(player).unwrap().translation;
    let parcel_pos = app.world().get::<Transform>(parcel).unwrap().translation;
    assert!(parcel_pos.y > player_pos.y + 1.0);
    assert!(player_pos.distance(parcel_pos) < 2.0);

    // Sprinting while carrying switches to the running carry state and back.
    {
        let mut input = input_mut(&mut app);
        input.movement = Vec2::new(0.0, -1.0);
        input.run_held = true;
    }
    step(&mut app);
    assert_eq!(
        player_state(&app, player),
        PlayerState::RunningCarry { parcel }
    );
    {
        let mut input = input_mut(&mut app);
        input.movement = Vec2::ZERO;
        input.run_held = false;
    }
    step(&mut app);
    assert_eq!(player_state(&app, player), PlayerState::Carry { parcel });

    // Holding the throw button enters the aim state and builds charge.
    {
        let mut input = input_mut(&mut app);
        input.throw_pressed = true;
        input.throw_held = true;
    }
    step(&mut app);
    clear_edges(&mut app);
    assert!(matches!(
        player_state(&app, player),
        PlayerState::ThrowAim { parcel: held, .. } if held == parcel
    ));
    settle(&mut app, 5);
    let PlayerState::ThrowAim { charge, .. } = player_state(&app, player) else {
        panic!("left the aim state while the button was held");
    };
    assert!(charge > 0.0);

    // Release: the parcel flies forward and up, the player walks again.
    {
        let mut input = input_mut(&mut app);
        input.throw_held = false;
        input.throw_released = true;
    }
    step(&mut app);
    clear_edges(&mut app);
    assert_eq!(player_state(&app, player), PlayerState::Walk);
    assert_eq!(carried(&app), None);
    assert!(!app.world().get::<Parcel>(parcel).unwrap().is_carried);
    assert!(app.world().get::<ColliderDisabled>(parcel).is_none());
    let velocity = app.world().get::<LinearVelocity>(parcel).unwrap();
    assert!(velocity.z < 0.0, "thrown along the facing direction");
    assert!(velocity.length() > 3.0);
}

#[test]
fn dropping_respects_the_repickup_grace_window() {
    let mut app = test_app();
    SpawnPlayer {
        position: Vec3::new(0.0, 1.0, 0.0),
    }
    .apply(app.world_mut());
    let parcel = app
        .world_mut()
        .spawn(parcel_bundle(Vec3::new(0.0, 0.3, -1.5)))
        .id();
    settle(&mut app, 10);
    let player = player_entity(&mut app);

    press_pickup(&mut app);
    assert_eq!(carried(&app), Some(parcel));

    // Drop: placed ahead on the ground, locomotion resumes.
    press_pickup(&mut app);
    assert_eq!(player_state(&app, player), PlayerState::Walk);
    assert_eq!(carried(&app), None);
    let player_pos = app.world().get::<Transform>(player).unwrap().translation;
    let parcel_pos = app.world().get::<Transform>(parcel).unwrap().translation;
    assert!(parcel_pos.z < player_pos.z, "dropped in front of the player");

    // Inside the grace window the same parcel cannot be grabbed back.
    press_pickup(&mut app);
    assert_eq!(carried(&app), None);
    assert_eq!(player_state(&app, player), PlayerState::Walk);

    // Once the window passes, pickup works again. Several medium frames, so
    // virtual time is credited in full despite the max-delta clamp.
    for _ in 0..6 {
        std::thread::sleep(Duration::from_millis(120));
        app.update();
    }
    press_pickup(&mut app);
    assert_eq!(carried(&app), Some(parcel));
}

#[test]
fn the_closest_parcel_wins_the_pickup() {
    let mut app = test_app();
    SpawnPlayer {
        position: Vec3::new(0.0, 1.0, 0.0),
    }
    .apply(app.world_mut());
    let far = app
        .world_mut()
        .spawn(parcel_bundle(Vec3::new(0.6, 0.3, -1.6)))
        .id();
    let near = app
        .world_mut()
        .spawn(parcel_bundle(Vec3::new(0.0, 0.3, -1.2)))
        .id();
    settle(&mut app, 10);

    press_pickup(&mut app);
    assert_eq!(carried(&app), Some(near));
    assert!(!app.world().get::<Parcel>(far).unwrap().is_carried);
}

#[test]
fn parcels_out_of_reach_are_ignored() {
    let mut app = test_app();
    SpawnPlayer {
        position: Vec3::new(0.0, 1.0, 0.0),
    }
    .apply(app.world_mut());
    // Just outside the 2.0 pickup radius.
    app.world_mut()
        .spawn(parcel_bundle(Vec3::new(0.0, 0.3, -2.2)));
    settle(&mut app, 10);
    let player = player_entity(&mut app);

    press_pickup(&mut app);
    assert_eq!(carried(&app), None);
    assert_eq!(player_state(&app, player), PlayerState::Walk);
}

/// At every tick at most one registered parcel reports being carried, and it
/// is exactly the one the coordinator claims.
fn assert_single_carry(app: &mut App) {
    let slot = carried(app);
    let world = app.world_mut();
    let mut query = world.query::<(Entity, &Parcel)>();
    let held: Vec<Entity> = query
        .iter(world)
        .filter(|(_, parcel)| parcel.is_carried)
        .map(|(entity, _)| entity)
        .collect();
    assert!(held.len() <= 1, "more than one parcel is carried: {held:?}");
    assert_eq!(slot, held.first().copied());
}

#[test]
fn random_carry_sequences_never_hold_two_parcels() {
    let mut app = test_app();
    SpawnPlayer {
        position: Vec3::new(0.0, 1.0, 0.0),
    }
    .apply(app.world_mut());
    let mut parcels = vec![
        app.world_mut()
            .spawn(parcel_bundle(Vec3::new(0.0, 0.3, -1.2)))
            .id(),
        app.world_mut()
            .spawn(parcel_bundle(Vec3::new(0.8, 0.3, -1.0)))
            .id(),
        app.world_mut()
            .spawn(parcel_bundle(Vec3::new(-0.8, 0.3, -1.0)))
            .id(),
    ];
    settle(&mut app, 10);

    // Deterministic scramble of pickup, throw and despawn inputs.
    let mut rng = StdRng::seed_from_u64(0x0b0e);
    for _ in 0..80 {
        match rng.random_range(0..6) {
            0 | 1 => input_mut(&mut app).pickup_pressed = true,
            2 => {
                let mut input = input_mut(&mut app);
                input.throw_pressed = true;
                input.throw_held = true;
            }
            3 => {
                let mut input = input_mut(&mut app);
                input.throw_held = false;
                input.throw_released = true;
            }
            4 if parcels.len() > 1 => {
                let index = rng.random_range(0..parcels.len());
                app.world_mut().entity_mut(parcels.swap_remove(index)).despawn();
            }
            _ => {}
        }
        step(&mut app);
        clear_edges(&mut app);
        assert_single_carry(&mut app);
    }
}

#[test]
fn vehicle_hit_knocks_the_player_down_and_jolts_the_parcel_loose() {
    let mut app = test_app();
    SpawnPlayer {
        position: Vec3::new(0.0, 1.0, 0.0),
    }
    .apply(app.world_mut());
    let parcel = app
        .world_mut()
        .spawn(parcel_bundle(Vec3::new(0.0, 0.3, -1.5)))
        .id();
    settle(&mut app, 10);
    let player = player_entity(&mut app);

    press_pickup(&mut app);
    assert_eq!(carried(&app), Some(parcel));

    // A car barreling straight through the player's position.
    app.world_mut().spawn(car_bundle(
        Car::new(vec![Vec3::new(0.0, 0.7, 30.0)], 8.0),
        Vec3::new(0.0, 0.7, -10.0),
    ));

    let hit = step_until(&mut app, 200, |app| {
        matches!(player_state(app, player), PlayerState::Impact { .. })
    });
    assert!(hit, "the car never reached the player");
    assert_eq!(carried(&app), None);
    assert!(!app.world().get::<Parcel>(parcel).unwrap().is_carried);

    let recovered = step_until(&mut app, 200, |app| {
        !matches!(player_state(app, player), PlayerState::Impact { .. })
    });
    assert!(recovered, "the player never got back up");
}

#[test]
fn settled_parcels_inside_a_zone_are_delivered() {
    let mut app = test_app();
    app.world_mut()
        .spawn(delivery::zone_bundle(Vec3::ZERO, 2.0));
    let parcel = app
        .world_mut()
        .spawn(parcel_bundle(Vec3::new(0.5, 0.5, 0.0)))
        .id();

    let delivered = step_until(&mut app, 100, |app| {
        app.world().get_entity(parcel).is_err()
    });
    assert!(delivered, "the parcel never settled into the zone");
    assert_eq!(app.world().resource::<DeliveryScore>().delivered, 1);
}
