use bevy::input::InputSystem;
use bevy::prelude::*;

mod setup;
mod input;
mod actions;
mod prewarm;
mod scene;

// re-export the bits we actually need in main
use input::input_mapping_system;
use prewarm::{PrewarmSettings, PrewarmStackPlugin};

fn main() {
    App::new()
        // core engine plugins
        .add_plugins(DefaultPlugins)
        // where to find the config + capture; defaults point into assets/prewarm/
        .insert_resource(PrewarmSettings::default())
        // config, capture, variant materials, session + scene catalog
        .add_plugins(PrewarmStackPlugin)
        // camera anchor + ambient light
        .add_systems(Startup, setup::setup)
        // keys -> one-shot actions, ahead of everything in Update
        .add_systems(PreUpdate, input_mapping_system.after(InputSystem))
        .run();
}
