//! Minimal title screen: a text prompt that any key dismisses.

use bevy::prelude::*;

use crate::screens::Screen;

pub(super) fn plugin(app: &mut App) {
    app.add_systems(OnEnter(Screen::Title), spawn_title_screen);
    app.add_systems(
        Update,
        continue_to_gameplay.run_if(in_state(Screen::Title)),
    );
}

fn spawn_title_screen(mut commands: Commands) {
    commands.spawn((
        Name::new("Title Screen"),
        DespawnOnExit(Screen::Title),
        Node {
            width: percent(100),
            height: percent(100),
            justify_content: JustifyContent::Center,
            align_items: AlignItems::Center,
            flex_direction: FlexDirection::Column,
            ..default()
        },
        children![
            Text::new("PARCEL RUSH"),
            Text::new("WASD move - Shift run - E pick up / drop - hold RMB to aim, release to throw"),
            Text::new("Press any key to start"),
        ],
    ));
}

fn continue_to_gameplay(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_screen: ResMut<NextState<Screen>>,
) {
    if keyboard.get_just_pressed().next().is_some() {
        next_screen.set(Screen::Gameplay);
    }
}
