use bevy::input::{keyboard::KeyCode, ButtonInput};
use bevy::prelude::*;

use crate::actions::{ActionState, PrewarmAction};

pub const START_KEY: KeyCode = KeyCode::Space;
pub const STOP_KEY: KeyCode = KeyCode::Backspace;
pub const NEXT_SCENE_KEY: KeyCode = KeyCode::KeyN;

pub fn input_mapping_system(
    keys: Res<ButtonInput<KeyCode>>,
    mut action_state: ResMut<ActionState>,
) {
    action_state.set(PrewarmAction::Start, keys.just_pressed(START_KEY));
    action_state.set(PrewarmAction::Stop, keys.just_pressed(STOP_KEY));
    action_state.set(PrewarmAction::NextScene, keys.just_pressed(NEXT_SCENE_KEY));
}
