use bevy::prelude::*;

use crate::prewarm::PrewarmAnchor;

pub fn setup(
    mut commands: Commands,
) {
    // 1) Ambient fill so unlit subsets still show the batch
    commands.insert_resource(AmbientLight {
        brightness: 200.0,
        ..default()
    });

    // 2) Camera; prewarm objects are placed in front of it
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 2.0, 0.0).looking_to(Vec3::NEG_Z, Vec3::Y),
        PrewarmAnchor,
    ));
}
