//! Follow camera: keeps a fixed high offset behind the player so the cursor
//! can always be projected onto the ground plane for aiming.

use bevy::prelude::*;

use crate::{game::player::Player, screens::Screen};

const CAMERA_OFFSET: Vec3 = Vec3::new(0.0, 14.0, 9.0);
const FOLLOW_SMOOTHING: f32 = 5.0;

pub(super) fn plugin(app: &mut App) {
    app.add_systems(Update, follow_player.run_if(in_state(Screen::Gameplay)));
}

fn follow_player(
    time: Res<Time>,
    players: Query<&Transform, With<Player>>,
    mut cameras: Query<&mut Transform, (With<Camera3d>, Without<Player>)>,
) {
    let Ok(player) = players.single() else {
        return;
    };
    let dt = time.delta_secs();
    for mut camera in &mut cameras {
        let target = player.translation + CAMERA_OFFSET;
        camera.translation = camera.translation.lerp(target, (FOLLOW_SMOOTHING * dt).min(1.0));
        camera.look_at(player.translation, Vec3::Y);
    }
}
