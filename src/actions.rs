use bevy::prelude::*;
use std::collections::HashMap;

/// One-shot triggers, set for the frame their key went down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrewarmAction {
    Start,
    Stop,
    NextScene,
}

/// This frame's prewarm triggers, written by `input_mapping_system` in
/// `PreUpdate` and read by the session and scene systems in `Update`.
#[derive(Default, Resource)]
pub struct ActionState {
    pressed: HashMap<PrewarmAction, bool>,
}

impl ActionState {
    pub fn set(&mut self, action: PrewarmAction, is_pressed: bool) {
        self.pressed.insert(action, is_pressed);
    }

    pub fn pressed(&self, action: PrewarmAction) -> bool {
        *self.pressed.get(&action).unwrap_or(&false)
    }
}
