// src/scene.rs
//! Scene catalog: which backdrop scene is loaded, and validated requests to switch.

use bevy::prelude::*;

use crate::actions::{ActionState, PrewarmAction};
use crate::prewarm::config::SceneCatalogDef;

/// Scenes known to the app (asset paths) and the one currently active.
#[derive(Resource, Debug, Clone, Default)]
pub struct SceneCatalog {
    scenes: Vec<String>,
    active: usize,
    next_scene_index: i64,
}

/// Fired when a transition request was accepted.
#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct SceneTransition {
    pub from: usize,
    pub to: usize,
    pub scene: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneTransitionError {
    #[error("scene index {index} is out of range ({count} scenes in catalog)")]
    OutOfRange { index: i64, count: usize },
    #[error("scene {index} ('{scene}') is already active")]
    AlreadyActive { index: usize, scene: String },
}

impl SceneCatalog {
    pub fn new(scenes: Vec<String>, active: usize, next_scene_index: i64) -> Self {
        Self { scenes, active, next_scene_index }
    }

    pub fn from_def(def: &SceneCatalogDef) -> Self {
        Self::new(def.scenes.clone(), def.active, def.next_scene_index)
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn active_scene(&self) -> Option<&str> {
        self.scenes.get(self.active).map(String::as_str)
    }

    pub fn next_scene_index(&self) -> i64 {
        self.next_scene_index
    }

    /// Switch to `target`. Rejected requests leave the catalog untouched.
    pub fn request_transition(&mut self, target: i64) -> Result<SceneTransition, SceneTransitionError> {
        let count = self.scenes.len();
        let index = usize::try_from(target)
            .ok()
            .filter(|&i| i < count)
            .ok_or(SceneTransitionError::OutOfRange { index: target, count })?;

        if index == self.active {
            return Err(SceneTransitionError::AlreadyActive {
                index,
                scene: self.scenes[index].clone(),
            });
        }

        let from = self.active;
        self.active = index;
        Ok(SceneTransition { from, to: index, scene: self.scenes[index].clone() })
    }
}

/// Root entity of the currently loaded catalog scene.
#[derive(Component, Debug, Clone, Copy)]
pub struct CatalogSceneRoot;

pub struct ScenePlugin;
impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SceneCatalog>()
            .add_event::<SceneTransition>()
            .add_systems(Update, (handle_scene_requests, sync_scene_root).chain());
    }
}

/// Update: on the next-scene trigger, validate and apply the configured target.
pub fn handle_scene_requests(
    actions: Res<ActionState>,
    mut catalog: ResMut<SceneCatalog>,
    mut transitions: EventWriter<SceneTransition>,
) {
    if !actions.pressed(PrewarmAction::NextScene) {
        return;
    }

    let target = catalog.next_scene_index();
    match catalog.bypass_change_detection().request_transition(target) {
        Ok(transition) => {
            info!(
                "Scene: switching from {} to {} ('{}')",
                transition.from, transition.to, transition.scene
            );
            catalog.set_changed();
            transitions.write(transition);
        }
        Err(e @ SceneTransitionError::OutOfRange { .. }) => {
            error!("Scene: {e}; check the scene list in the prewarm config");
        }
        Err(e @ SceneTransitionError::AlreadyActive { .. }) => {
            warn!("Scene: {e}");
        }
    }
}

/// Update: keep exactly one root spawned for the active scene.
fn sync_scene_root(
    mut commands: Commands,
    catalog: Res<SceneCatalog>,
    assets: Res<AssetServer>,
    roots: Query<Entity, With<CatalogSceneRoot>>,
) {
    if !catalog.is_changed() {
        return;
    }
    for e in &roots {
        commands.entity(e).despawn();
    }
    let Some(path) = catalog.active_scene() else { return };
    commands.spawn((
        Name::new(format!("Scene - {path}")),
        CatalogSceneRoot,
        Transform::IDENTITY,
        Visibility::Visible,
        SceneRoot(assets.load(path)),
    ));
    info!("Scene: loading '{}' (index {})", path, catalog.active());
}
