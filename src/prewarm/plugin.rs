//! Prewarm plugin wiring (glue).
//! - Config + keyword capture assets/loaders
//! - Variant material pipeline
//! - Session prepare / triggers / tick / teardown, chained in that order

use bevy::prelude::*;

use super::config::{KeywordCapture, PrewarmConfig, PrewarmConfigAssetPlugin};
use super::material::VariantMaterial;
use super::systems::{
    handle_prewarm_triggers, prepare_session, teardown_on_exit, tick_prewarm_session, PrewarmSession,
};

/// Where the config and keyword capture live, and the placement seed.
#[derive(Resource, Clone)]
pub struct PrewarmSettings {
    pub config_path: String,
    /// `None` runs with whatever keyword map the config already stores.
    pub capture_path: Option<String>,
    /// File the resolved config is written to after a capture is applied.
    pub resolved_output: Option<String>,
    pub rng_seed: u64,
}
impl Default for PrewarmSettings {
    fn default() -> Self {
        Self {
            config_path: "prewarm/default.prewarm.ron".to_string(),
            capture_path: Some("prewarm/capture.keywords.ron".to_string()),
            resolved_output: None,
            rng_seed: 1337,
        }
    }
}

/// Handles to the loaded config and capture assets.
#[derive(Resource, Default)]
pub struct PrewarmHandles {
    pub config: Handle<PrewarmConfig>,
    pub capture: Option<Handle<KeywordCapture>>,
}

pub struct PrewarmPlugin;
impl Plugin for PrewarmPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(PrewarmConfigAssetPlugin)
            .add_plugins(MaterialPlugin::<VariantMaterial>::default())
            .init_resource::<PrewarmSettings>()
            .init_resource::<PrewarmHandles>()
            .init_resource::<PrewarmSession>()
            .add_systems(Startup, load_prewarm_assets)
            .add_systems(
                Update,
                (
                    prepare_session,
                    handle_prewarm_triggers,
                    tick_prewarm_session,
                    teardown_on_exit,
                )
                    .chain(),
            );
    }
}

/// Startup: request the config (and capture) loads, store handles.
fn load_prewarm_assets(
    mut handles: ResMut<PrewarmHandles>,
    settings: Res<PrewarmSettings>,
    assets: Res<AssetServer>,
) {
    if handles.config.is_strong() { return; }
    handles.config = assets.load(settings.config_path.as_str());
    handles.capture = settings.capture_path.as_deref().map(|p| assets.load(p));
    info!(
        "Prewarm: loading config from '{}', capture {:?}, rng_seed={}",
        settings.config_path, settings.capture_path, settings.rng_seed
    );
}
