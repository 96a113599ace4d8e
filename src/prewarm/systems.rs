// src/prewarm/systems.rs
//! Bevy systems driving a prewarm session: prepare -> triggers -> tick -> teardown.

use bevy::prelude::*;

use crate::actions::{ActionState, PrewarmAction};
use crate::scene::{SceneCatalog, SceneTransition};

use super::collector::CollectedPass;
use super::config::{KeywordCapture, PrewarmConfig};
use super::generator::generate;
use super::material::VariantMaterial;
use super::placement::{AnchorPose, SpawnVolume};
use super::plugin::{PrewarmHandles, PrewarmSettings};
use super::queue::PrewarmPlan;
use super::scheduler::{PrewarmScheduler, ScheduleSettings, SchedulePhase, StartOutcome};
use super::spawn::{EcsSpawner, PrewarmAssets};

/// Marks the entity prewarm objects are placed in front of (usually the camera).
#[derive(Component, Debug, Clone, Copy)]
pub struct PrewarmAnchor;

/// The single scheduler instance plus the plan it runs once prepared.
#[derive(Resource)]
pub struct PrewarmSession {
    pub scheduler: PrewarmScheduler<Entity>,
    pub plan: Option<PrewarmPlan>,
}

impl Default for PrewarmSession {
    fn default() -> Self {
        Self {
            scheduler: PrewarmScheduler::new(ScheduleSettings::default(), SpawnVolume::default(), 0),
            plan: None,
        }
    }
}

impl PrewarmSession {
    pub fn is_prepared(&self) -> bool {
        self.plan.is_some()
    }
}

/// Update: once the config (and capture, if any) are loaded, resolve the
/// captured keywords into the config, generate variants and build engine assets.
#[allow(clippy::too_many_arguments)]
pub fn prepare_session(
    mut commands: Commands,
    handles: Res<PrewarmHandles>,
    settings: Res<PrewarmSettings>,
    asset_server: Res<AssetServer>,
    mut configs: ResMut<Assets<PrewarmConfig>>,
    captures: Res<Assets<KeywordCapture>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut variant_materials: ResMut<Assets<VariantMaterial>>,
    mut session: ResMut<PrewarmSession>,
    mut reported_failure: Local<bool>,
) {
    if session.is_prepared() {
        return;
    }

    if !configs.contains(&handles.config) {
        if asset_server.load_state(&handles.config).is_failed() && !*reported_failure {
            *reported_failure = true;
            error!("Prewarm: config '{}' failed to load, nothing to prewarm", settings.config_path);
        }
        return;
    }

    let passes = match &handles.capture {
        None => None,
        Some(h) => match captures.get(h) {
            Some(capture) => Some(capture.collect()),
            None if asset_server.load_state(h).is_failed() => {
                warn!("Prewarm: keyword capture failed to load, using the stored keyword map");
                None
            }
            None => return,
        },
    };

    let Some(config) = configs.get_mut(&handles.config) else { return };
    if let Some(passes) = passes {
        let observed: usize = passes.iter().map(CollectedPass::observation_count).sum();
        let kept = config.apply_collected(&passes);
        info!(
            "Prewarm: applied {} captured passes ({} observations), {} combinations kept",
            passes.len(),
            observed,
            kept
        );
        if let Some(path) = &settings.resolved_output {
            match config.save_ron(path) {
                Ok(()) => info!("Prewarm: resolved config written to '{}'", path),
                Err(e) => error!("Prewarm: could not write resolved config to '{}': {e}", path),
            }
        }
    }

    let variants = generate(&config.shader_keywords);
    info!("Prewarm: generated {} material variants", variants.len());

    let assets = PrewarmAssets::build(
        config,
        &variants,
        &asset_server,
        &mut meshes,
        &mut materials,
        &mut variant_materials,
    );
    commands.insert_resource(assets);
    commands.insert_resource(SceneCatalog::from_def(&config.scenes));

    session.scheduler = PrewarmScheduler::new(config.schedule, config.volume, settings.rng_seed);
    session.plan = Some(config.plan(&variants));
    info!("Prewarm: ready, press Space to start");
}

/// Update: start/stop triggers.
pub fn handle_prewarm_triggers(
    mut commands: Commands,
    actions: Res<ActionState>,
    mut session: ResMut<PrewarmSession>,
) {
    if actions.pressed(PrewarmAction::Start) {
        match session.plan.clone() {
            Some(plan) => {
                if session.scheduler.start(plan) == StartOutcome::Started {
                    info!("Prewarm: session triggered");
                }
            }
            None => warn!("Prewarm: config not loaded yet, start ignored"),
        }
    }

    if actions.pressed(PrewarmAction::Stop) {
        stop_session(&mut commands, &mut session);
    }
}

/// Update: one scheduler step against the anchor's current pose.
pub fn tick_prewarm_session(
    mut commands: Commands,
    time: Res<Time>,
    assets: Option<Res<PrewarmAssets>>,
    meshes: Res<Assets<Mesh>>,
    anchor: Query<&GlobalTransform, With<PrewarmAnchor>>,
    mut session: ResMut<PrewarmSession>,
    mut drained_logged: Local<bool>,
) {
    if !session.scheduler.is_running() {
        return;
    }
    let Some(assets) = assets else { return };
    let pose = anchor.single().map(AnchorPose::from_global).unwrap_or_default();

    let mut spawner = EcsSpawner { commands: &mut commands, assets: &assets, meshes: &meshes };
    let report = session.scheduler.tick(time.elapsed_secs(), &pose, &mut spawner);
    if report.spawned > 0 || report.despawned > 0 {
        debug!(
            "Prewarm: tick spawned {} despawned {} ({} queued, {} lights up)",
            report.spawned,
            report.despawned,
            session.scheduler.queues().len(),
            session.scheduler.live_light_count()
        );
    }

    let drained = session.scheduler.queues().is_empty()
        && session.scheduler.cleanup_len() == 0
        && session.scheduler.phase() == SchedulePhase::Active;
    if drained && !*drained_logged {
        info!("Prewarm: all queues drained");
    }
    *drained_logged = drained;
}

/// Update: a scene switch or app exit ends the session.
pub fn teardown_on_exit(
    mut commands: Commands,
    mut exits: EventReader<AppExit>,
    mut transitions: EventReader<SceneTransition>,
    mut session: ResMut<PrewarmSession>,
) {
    let exiting = exits.read().count() > 0;
    let switching = transitions.read().count() > 0;
    if exiting || switching {
        stop_session(&mut commands, &mut session);
    }
}

fn stop_session(commands: &mut Commands, session: &mut PrewarmSession) {
    if !session.scheduler.is_running() {
        return;
    }
    let outstanding = session.scheduler.teardown();
    for e in &outstanding {
        if let Ok(mut ec) = commands.get_entity(*e) {
            ec.despawn();
        }
    }
    info!("Prewarm: session stopped, {} objects discarded", outstanding.len());
}
