//! Per-frame input snapshot.
//!
//! All gameplay systems read input from [`InputSnapshot`] instead of polling
//! devices themselves. One system fills the snapshot at the top of the frame,
//! so every consumer sees the same edges and levels for the whole tick.

use bevy::{prelude::*, window::PrimaryWindow};

use crate::{AppSystems, screens::Screen};

pub fn plugin(app: &mut App) {
    app.init_resource::<InputSnapshot>();
    app.add_systems(
        Update,
        (record_input, record_aim_point)
            .chain()
            .in_set(AppSystems::RecordInput)
            .run_if(in_state(Screen::Gameplay)),
    );
}

/// Discrete "this frame" edges and continuous levels, captured once per tick.
#[derive(Resource, Debug, Clone, Default)]
pub struct InputSnapshot {
    /// Camera-relative movement intent on the ground plane (world X/Z).
    pub movement: Vec2,
    pub run_held: bool,
    /// Pickup (or drop, while carrying) was pressed this frame.
    pub pickup_pressed: bool,
    /// Throw button went down this frame.
    pub throw_pressed: bool,
    pub throw_held: bool,
    /// Throw button was released this frame.
    pub throw_released: bool,
    /// World point under the cursor on the ground plane, when a cursor exists.
    pub aim_point: Option<Vec3>,
}

impl InputSnapshot {
    pub fn is_moving(&self) -> bool {
        self.movement != Vec2::ZERO
    }

    /// Movement intent as a world-space direction on the ground plane.
    pub fn movement_direction(&self) -> Vec3 {
        Vec3::new(self.movement.x, 0.0, self.movement.y)
    }
}

fn record_input(
    mut snapshot: ResMut<InputSnapshot>,
    keyboard: Option<Res<ButtonInput<KeyCode>>>,
    mouse: Option<Res<ButtonInput<MouseButton>>>,
    camera_query: Query<&Transform, With<Camera3d>>,
) {
    // Headless apps (tests) drive the snapshot directly.
    let (Some(keyboard), Some(mouse)) = (keyboard, mouse) else {
        return;
    };

    // Get camera forward/right for relative movement, flattened to the
    // horizontal plane. Fall back to world axes if no camera.
    let (cam_forward, cam_right) = if let Ok(camera_transform) = camera_query.single() {
        let forward = camera_transform.forward();
        let right = camera_transform.right();
        let forward_flat = Vec3::new(forward.x, 0.0, forward.z).normalize_or_zero();
        let right_flat = Vec3::new(right.x, 0.0, right.z).normalize_or_zero();
        (forward_flat, right_flat)
    } else {
        (Vec3::NEG_Z, Vec3::X)
    };

    let mut direction = Vec3::ZERO;
    if keyboard.pressed(KeyCode::KeyW) || keyboard.pressed(KeyCode::ArrowUp) {
        direction += cam_forward;
    }
    if keyboard.pressed(KeyCode::KeyS) || keyboard.pressed(KeyCode::ArrowDown) {
        direction -= cam_forward;
    }
    if keyboard.pressed(KeyCode::KeyA) || keyboard.pressed(KeyCode::ArrowLeft) {
        direction -= cam_right;
    }
    if keyboard.pressed(KeyCode::KeyD) || keyboard.pressed(KeyCode::ArrowRight) {
        direction += cam_right;
    }
    // Normalize to prevent faster diagonal movement.
    direction = direction.normalize_or_zero();

    snapshot.movement = Vec2::new(direction.x, direction.z);
    snapshot.run_held =
        keyboard.pressed(KeyCode::ShiftLeft) || keyboard.pressed(KeyCode::ShiftRight);
    snapshot.pickup_pressed = keyboard.just_pressed(KeyCode::KeyE);
    snapshot.throw_pressed = mouse.just_pressed(MouseButton::Right);
    snapshot.throw_held = mouse.pressed(MouseButton::Right);
    snapshot.throw_released = mouse.just_released(MouseButton::Right);
}

/// Projects the cursor onto the ground plane so the throw aim can follow it.
fn record_aim_point(
    mut snapshot: ResMut<InputSnapshot>,
    window: Query<&Window, With<PrimaryWindow>>,
    camera_query: Query<(&Camera, &GlobalTransform), With<Camera3d>>,
) {
    snapshot.aim_point = None;

    let Ok(window) = window.single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        return;
    };
    let Ok((camera, camera_transform)) = camera_query.single() else {
        return;
    };
    let Ok(ray) = camera.viewport_to_world(camera_transform, cursor) else {
        return;
    };

    if let Some(distance) = ray.intersect_plane(Vec3::ZERO, InfinitePlane3d::new(Vec3::Y)) {
        snapshot.aim_point = Some(ray.get_point(distance));
    }
}
