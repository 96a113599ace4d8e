// src/prewarm/stack.rs
use bevy::prelude::*;
use crate::actions::ActionState;
use crate::prewarm::plugin::PrewarmPlugin;
use crate::scene::ScenePlugin;

pub struct PrewarmStackPlugin;
impl Plugin for PrewarmStackPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ActionState>()
           .add_plugins(PrewarmPlugin)   // config + capture + session + tick
           .add_plugins(ScenePlugin);    // scene catalog + transitions
    }
}
