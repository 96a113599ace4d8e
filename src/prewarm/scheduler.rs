// src/prewarm/scheduler.rs
//! Frame-throttled prewarm scheduler.
//!
//! `tick` is a step function: the host calls it once per frame with the
//! current time. A spawned batch is followed by one tick per light subset,
//! during which the batch stays alive and only the lights change. Spawning
//! itself goes through `PrewarmSpawner`, so the scheduler never touches the
//! engine directly.

use std::collections::VecDeque;

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::lights::{enumerate_light_subsets, LightRig, LightSubset};
use super::placement::{unit_scale_for_extent, AnchorPose, SpawnVolume};
use super::queue::{MaterialRef, PrewarmPlan, QueuePriority, SpawnQueueItem, SpawnQueues};

/// Throttle knobs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// Seconds between spawn batches (lower bound).
    #[serde(default = "default_interval")]
    pub min_spawn_interval: f32,
    /// Seconds between cleanup sweeps (lower bound).
    #[serde(default = "default_interval")]
    pub min_despawn_interval: f32,
    /// Objects spawned per batch at most. The config loader rejects 0.
    #[serde(default = "default_batch")]
    pub max_batch_size: usize,
}

fn default_interval() -> f32 {
    0.015
}
fn default_batch() -> usize {
    50
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            min_spawn_interval: default_interval(),
            min_despawn_interval: default_interval(),
            max_batch_size: default_batch(),
        }
    }
}

/// Engine seam. Indices refer into the plan handed to `PrewarmScheduler::start`.
pub trait PrewarmSpawner {
    type Instance: Copy;

    fn spawn_seed_object(&mut self, prefab: usize, transform: Transform) -> Self::Instance;

    fn spawn_mesh(&mut self, mesh: usize, material: MaterialRef, transform: Transform) -> Self::Instance;

    /// Bounding-box size of a seed mesh renderer, if known yet.
    fn renderer_extent(&self, renderer: usize) -> Option<Vec3>;

    fn spawn_renderer_clone(
        &mut self,
        renderer: usize,
        material: MaterialRef,
        transform: Transform,
    ) -> Self::Instance;

    fn spawn_light(&mut self, light: usize, rig: &LightRig) -> Self::Instance;

    fn despawn(&mut self, instance: Self::Instance);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SchedulePhase {
    #[default]
    Idle,
    Active,
    /// Cycling light subsets over the batch spawned `spawn_count` objects ago.
    Lighting { next_subset: usize, spawn_count: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// What one tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub lights_cleared: usize,
    pub despawned: usize,
    pub spawned: usize,
    pub lights_spawned: usize,
    /// Index into `light_subsets()` lit this tick.
    pub subset: Option<usize>,
}

pub struct PrewarmScheduler<I> {
    settings: ScheduleSettings,
    volume: SpawnVolume,
    plan: PrewarmPlan,
    phase: SchedulePhase,
    last_spawn: f32,
    last_despawn: f32,
    queues: SpawnQueues,
    cleanup: VecDeque<I>,
    live_lights: Vec<I>,
    subsets: Vec<LightSubset>,
    last_material: Option<MaterialRef>,
    rng: ChaCha8Rng,
}

impl<I: Copy> PrewarmScheduler<I> {
    pub fn new(settings: ScheduleSettings, volume: SpawnVolume, seed: u64) -> Self {
        Self {
            settings,
            volume,
            plan: PrewarmPlan::default(),
            phase: SchedulePhase::Idle,
            last_spawn: 0.0,
            last_despawn: 0.0,
            queues: SpawnQueues::default(),
            cleanup: VecDeque::new(),
            live_lights: Vec::new(),
            subsets: Vec::new(),
            last_material: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn phase(&self) -> SchedulePhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase != SchedulePhase::Idle
    }

    pub fn queues(&self) -> &SpawnQueues {
        &self.queues
    }

    pub fn cleanup_len(&self) -> usize {
        self.cleanup.len()
    }

    pub fn live_light_count(&self) -> usize {
        self.live_lights.len()
    }

    #[cfg(test)]
    pub fn light_subsets(&self) -> &[LightSubset] {
        &self.subsets
    }

    /// Prepare a session from `plan` and start ticking. A second call while a
    /// session runs changes nothing.
    pub fn start(&mut self, plan: PrewarmPlan) -> StartOutcome {
        if self.is_running() {
            info!("Prewarm: prewarm session already started");
            return StartOutcome::AlreadyRunning;
        }

        self.queues.clear();
        self.queues.populate(&plan);
        self.subsets = if plan.lights.is_empty() {
            Vec::new()
        } else {
            enumerate_light_subsets(plan.lights.len())
        };
        if !self.subsets.is_empty() {
            info!("Prewarm: {} light subsets prepared", self.subsets.len());
        }
        self.last_material = None;
        self.plan = plan;
        self.phase = SchedulePhase::Active;
        info!("Prewarm: session started with {} queued items", self.queues.len());
        StartOutcome::Started
    }

    /// One scheduling step at time `now` (seconds).
    pub fn tick<S>(&mut self, now: f32, anchor: &AnchorPose, spawner: &mut S) -> TickReport
    where
        S: PrewarmSpawner<Instance = I>,
    {
        let mut report = TickReport {
            lights_cleared: self.clear_lights(spawner),
            ..default()
        };

        if let SchedulePhase::Lighting { next_subset, spawn_count } = self.phase {
            self.light_subset(next_subset, spawn_count, anchor, spawner, &mut report);
            return report;
        }

        if now - self.last_despawn >= self.settings.min_despawn_interval {
            self.last_despawn = now;
            if !self.cleanup.is_empty() {
                debug!("Prewarm: despawning {} objects", self.cleanup.len());
                report.despawned = self.cleanup.len();
                for instance in self.cleanup.drain(..) {
                    spawner.despawn(instance);
                }
            }
        }

        if self.phase == SchedulePhase::Active
            && now - self.last_spawn >= self.settings.min_spawn_interval
        {
            self.last_spawn = now;
            let spawn_count = self.drain(anchor, spawner);
            report.spawned = spawn_count;
            if spawn_count > 0 && !self.subsets.is_empty() {
                self.phase = SchedulePhase::Lighting { next_subset: 0, spawn_count };
            }
        }

        report
    }

    /// Spawn up to `max_batch_size` items from the highest-priority lane that
    /// has work. Lower lanes are only reached when every higher lane yielded
    /// nothing.
    pub fn drain<S>(&mut self, anchor: &AnchorPose, spawner: &mut S) -> usize
    where
        S: PrewarmSpawner<Instance = I>,
    {
        let cap = self.settings.max_batch_size;
        let mut count = 0usize;
        if cap == 0 {
            return 0;
        }

        for lane in QueuePriority::ORDERED {
            let had_work = self.queues.lane_len(lane) > 0;
            while count < cap {
                let Some(item) = self.queues.pop(lane) else { break };
                let instance = self.spawn_item(item, anchor, spawner);
                self.cleanup.push_back(instance);
                count += 1;
            }
            if had_work && self.queues.lane_len(lane) == 0 {
                info!("Prewarm: finished {}", lane.label());
            }
            if count > 0 {
                return count;
            }
        }
        0
    }

    /// End the session. Returns every outstanding instance (batch + lights)
    /// for the host to discard; queued work is dropped.
    pub fn teardown(&mut self) -> Vec<I> {
        let mut outstanding: Vec<I> = self.cleanup.drain(..).collect();
        outstanding.append(&mut self.live_lights);
        self.queues.clear();
        self.subsets.clear();
        self.last_material = None;
        self.plan = PrewarmPlan::default();
        self.phase = SchedulePhase::Idle;
        outstanding
    }

    fn clear_lights<S>(&mut self, spawner: &mut S) -> usize
    where
        S: PrewarmSpawner<Instance = I>,
    {
        let n = self.live_lights.len();
        for light in self.live_lights.drain(..) {
            spawner.despawn(light);
        }
        n
    }

    fn light_subset<S>(
        &mut self,
        index: usize,
        spawn_count: usize,
        anchor: &AnchorPose,
        spawner: &mut S,
        report: &mut TickReport,
    ) where
        S: PrewarmSpawner<Instance = I>,
    {
        let Some(subset) = self.subsets.get(index) else {
            self.phase = SchedulePhase::Active;
            return;
        };

        let names: Vec<&str> = subset
            .members
            .iter()
            .filter_map(|&i| self.plan.lights.get(i).map(|l| l.name.as_str()))
            .collect();
        info!(
            "Prewarm: lighting {} spawned objects with subset {}/{}: {}",
            spawn_count,
            index + 1,
            self.subsets.len(),
            names.join(" | ")
        );

        for &light in &subset.members {
            let Some(def) = self.plan.lights.get(light) else { continue };
            let rig = LightRig::derive(def.kind, anchor, &self.volume);
            self.live_lights.push(spawner.spawn_light(light, &rig));
            report.lights_spawned += 1;
        }
        report.subset = Some(index);

        let next = index + 1;
        self.phase = if next < self.subsets.len() {
            SchedulePhase::Lighting { next_subset: next, spawn_count }
        } else {
            SchedulePhase::Active
        };
    }

    fn spawn_item<S>(&mut self, item: SpawnQueueItem, anchor: &AnchorPose, spawner: &mut S) -> I
    where
        S: PrewarmSpawner<Instance = I>,
    {
        let position = self.volume.random_point(anchor, &mut self.rng);
        let mut transform = Transform::from_translation(position);

        match item {
            SpawnQueueItem::SeedObject(prefab) => {
                debug!(
                    "Prewarm: spawn seed object '{}'",
                    self.plan.prefabs.get(prefab).map(String::as_str).unwrap_or("?")
                );
                spawner.spawn_seed_object(prefab, transform)
            }
            SpawnQueueItem::MeshMaterial { mesh, material } => {
                self.note_material(material, "mesh seeds");
                spawner.spawn_mesh(mesh, material, transform)
            }
            SpawnQueueItem::RendererMaterial { renderer, material } => {
                self.note_material(material, "mesh renderer seeds");
                match spawner.renderer_extent(renderer).and_then(unit_scale_for_extent) {
                    Some(s) => transform.scale = Vec3::splat(s),
                    None => debug!("Prewarm: no bounds for mesh renderer {}, keeping unit scale", renderer),
                }
                spawner.spawn_renderer_clone(renderer, material, transform)
            }
        }
    }

    fn note_material(&mut self, material: MaterialRef, seeds: &str) {
        if self.last_material != Some(material) {
            info!(
                "Prewarm: started prewarm rendering material \"{}\" with {}",
                self.plan.material_label(material),
                seeds
            );
            self.last_material = Some(material);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prewarm::lights::{LightKind, LightParams};
    use crate::prewarm::queue::{MeshSeedType, PlanLight, QueueOptions};
    use std::collections::{HashMap, HashSet};

    #[derive(Clone, Debug, PartialEq)]
    enum Spawned {
        Seed(usize),
        Mesh(usize, MaterialRef),
        Clone(usize, MaterialRef, Vec3),
        Light(usize, LightParams),
    }

    #[derive(Default)]
    struct Recorder {
        next: u32,
        live: HashMap<u32, Spawned>,
        history: Vec<Spawned>,
        extents: HashMap<usize, Vec3>,
    }

    impl Recorder {
        fn record(&mut self, s: Spawned) -> u32 {
            self.next += 1;
            self.live.insert(self.next, s.clone());
            self.history.push(s);
            self.next
        }

        fn live_lights(&self) -> usize {
            self.live.values().filter(|s| matches!(s, Spawned::Light(..))).count()
        }
    }

    impl PrewarmSpawner for Recorder {
        type Instance = u32;

        fn spawn_seed_object(&mut self, prefab: usize, _t: Transform) -> u32 {
            self.record(Spawned::Seed(prefab))
        }

        fn spawn_mesh(&mut self, mesh: usize, material: MaterialRef, _t: Transform) -> u32 {
            self.record(Spawned::Mesh(mesh, material))
        }

        fn renderer_extent(&self, renderer: usize) -> Option<Vec3> {
            self.extents.get(&renderer).copied()
        }

        fn spawn_renderer_clone(&mut self, renderer: usize, material: MaterialRef, t: Transform) -> u32 {
            self.record(Spawned::Clone(renderer, material, t.scale))
        }

        fn spawn_light(&mut self, light: usize, rig: &LightRig) -> u32 {
            self.record(Spawned::Light(light, rig.params))
        }

        fn despawn(&mut self, instance: u32) {
            assert!(self.live.remove(&instance).is_some(), "double despawn of {instance}");
        }
    }

    fn labels(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    fn lights(kinds: &[LightKind]) -> Vec<PlanLight> {
        kinds
            .iter()
            .enumerate()
            .map(|(i, &kind)| PlanLight { name: format!("light{i}"), kind })
            .collect()
    }

    fn scheduler(batch: usize) -> PrewarmScheduler<u32> {
        let settings = ScheduleSettings {
            min_spawn_interval: 0.5,
            min_despawn_interval: 0.5,
            max_batch_size: batch,
        };
        PrewarmScheduler::new(settings, SpawnVolume::default(), 42)
    }

    fn prefab_plan(prefabs: usize, meshes: usize) -> PrewarmPlan {
        PrewarmPlan {
            prefabs: labels("prefab", prefabs),
            materials: labels("mat", 1),
            meshes: labels("mesh", meshes),
            options: QueueOptions {
                use_source_prefabs: true,
                use_source_shaders: false,
                mesh_seed: MeshSeedType::Mesh,
                ..default()
            },
            ..default()
        }
    }

    #[test]
    fn batch_cap_limits_spawns_and_keeps_lower_lanes_waiting() {
        let anchor = AnchorPose::default();
        let mut rec = Recorder::default();
        let mut s = scheduler(50);
        assert_eq!(s.start(prefab_plan(70, 1)), StartOutcome::Started);

        let r = s.tick(1.0, &anchor, &mut rec);
        assert_eq!(r.spawned, 50);
        assert_eq!(s.queues().lane_len(QueuePriority::SeedObjects), 20);
        assert_eq!(s.queues().lane_len(QueuePriority::MeshMaterial), 1);
        assert_eq!(s.cleanup_len(), 50);

        // seed lane yields 20 and the batch ends there, even under the cap
        let r = s.tick(2.0, &anchor, &mut rec);
        assert_eq!(r.despawned, 50);
        assert_eq!(r.spawned, 20);
        assert_eq!(s.queues().lane_len(QueuePriority::MeshMaterial), 1);

        let r = s.tick(3.0, &anchor, &mut rec);
        assert_eq!(r.spawned, 1);
        assert_eq!(rec.history.last(), Some(&Spawned::Mesh(0, MaterialRef::Seed(0))));
        assert!(s.queues().is_empty());
    }

    #[test]
    fn drain_takes_min_of_cap_and_queue() {
        let anchor = AnchorPose::default();
        for (cap, queued) in [(1, 5), (5, 5), (8, 3), (50, 70), (3, 0), (0, 3)] {
            let mut rec = Recorder::default();
            let mut s = scheduler(cap);
            s.start(PrewarmPlan {
                meshes: labels("mesh", queued),
                materials: labels("mat", 1),
                options: QueueOptions { use_source_shaders: false, mesh_seed: MeshSeedType::Mesh, ..default() },
                ..default()
            });
            let spawned = s.drain(&anchor, &mut rec);
            assert_eq!(spawned, cap.min(queued), "cap {cap}, queued {queued}");
            assert_eq!(s.cleanup_len(), spawned);
            assert_eq!(s.queues().len(), queued - spawned);
        }
    }

    #[test]
    fn spawn_and_despawn_respect_their_intervals() {
        let anchor = AnchorPose::default();
        let mut rec = Recorder::default();
        let mut s = scheduler(2);
        s.start(prefab_plan(10, 0));

        assert_eq!(s.tick(0.2, &anchor, &mut rec).spawned, 0);
        let r = s.tick(0.5, &anchor, &mut rec);
        assert_eq!(r.spawned, 2);
        let r = s.tick(0.7, &anchor, &mut rec);
        assert_eq!((r.despawned, r.spawned), (0, 0));
        let r = s.tick(1.0, &anchor, &mut rec);
        assert_eq!((r.despawned, r.spawned), (2, 2));
        assert_eq!(rec.live.len(), 2);
    }

    #[test]
    fn light_subsets_cycle_one_per_tick_over_a_live_batch() {
        let anchor = AnchorPose::default();
        let mut rec = Recorder::default();
        let mut s = scheduler(50);
        let mut plan = prefab_plan(3, 0);
        plan.lights = lights(&[LightKind::Point, LightKind::Spot]);
        s.start(plan);
        assert_eq!(s.light_subsets().len(), 3);

        let r = s.tick(1.0, &anchor, &mut rec);
        assert_eq!(r.spawned, 3);
        assert_eq!(s.phase(), SchedulePhase::Lighting { next_subset: 0, spawn_count: 3 });

        // well past both intervals, but the batch stays while lights cycle
        let r = s.tick(5.0, &anchor, &mut rec);
        assert_eq!((r.subset, r.lights_spawned, r.despawned), (Some(0), 1, 0));
        let r = s.tick(6.0, &anchor, &mut rec);
        assert_eq!((r.lights_cleared, r.subset, r.lights_spawned), (1, Some(1), 1));
        let r = s.tick(7.0, &anchor, &mut rec);
        assert_eq!((r.lights_cleared, r.subset, r.lights_spawned), (1, Some(2), 2));
        assert_eq!(s.phase(), SchedulePhase::Active);
        assert_eq!(rec.live_lights(), 2);
        assert_eq!(s.live_light_count(), 2);
        assert_eq!(s.cleanup_len(), 3, "lights never enter the cleanup queue");

        let r = s.tick(8.0, &anchor, &mut rec);
        assert_eq!((r.lights_cleared, r.despawned, r.spawned), (2, 3, 0));
        assert!(rec.live.is_empty());
    }

    #[test]
    fn light_rigs_follow_light_kind() {
        let anchor = AnchorPose::default();
        let mut rec = Recorder::default();
        let mut s = scheduler(50);
        let mut plan = prefab_plan(1, 0);
        plan.lights = lights(&[LightKind::Point]);
        s.start(plan);
        s.tick(1.0, &anchor, &mut rec);
        s.tick(1.1, &anchor, &mut rec);
        assert_eq!(rec.history.last(), Some(&Spawned::Light(0, LightParams::Point { range: 15.0 })));
    }

    #[test]
    fn empty_queues_are_not_an_error_and_skip_lighting() {
        let anchor = AnchorPose::default();
        let mut rec = Recorder::default();
        let mut s = scheduler(50);
        let mut plan = prefab_plan(0, 0);
        plan.lights = lights(&[LightKind::Directional]);
        s.start(plan);
        let r = s.tick(1.0, &anchor, &mut rec);
        assert_eq!(r, TickReport::default());
        assert_eq!(s.phase(), SchedulePhase::Active);
    }

    #[test]
    fn renderer_clones_are_normalized_to_unit_size() {
        let anchor = AnchorPose::default();
        let mut rec = Recorder::default();
        rec.extents.insert(0, Vec3::new(2.0, 8.0, 4.0));
        let mut s = scheduler(50);
        s.start(PrewarmPlan {
            materials: labels("mat", 1),
            renderers: vec!["big".into(), "unknown".into()],
            options: QueueOptions {
                use_source_shaders: false,
                mesh_seed: MeshSeedType::MeshRenderer,
                ..default()
            },
            ..default()
        });
        assert_eq!(s.tick(1.0, &anchor, &mut rec).spawned, 2);
        assert_eq!(
            rec.history,
            vec![
                Spawned::Clone(0, MaterialRef::Seed(0), Vec3::splat(0.125)),
                Spawned::Clone(1, MaterialRef::Seed(0), Vec3::ONE),
            ]
        );
    }

    #[test]
    fn second_start_is_a_no_op() {
        let mut s = scheduler(50);
        assert_eq!(s.start(prefab_plan(4, 0)), StartOutcome::Started);
        assert_eq!(s.start(prefab_plan(9, 0)), StartOutcome::AlreadyRunning);
        assert_eq!(s.queues().len(), 4);
    }

    #[test]
    fn teardown_returns_everything_outstanding() {
        let anchor = AnchorPose::default();
        let mut rec = Recorder::default();
        let mut s = scheduler(5);
        let mut plan = prefab_plan(12, 2);
        plan.lights = lights(&[LightKind::Spot]);
        s.start(plan);
        s.tick(1.0, &anchor, &mut rec);
        s.tick(1.1, &anchor, &mut rec);
        assert_eq!(rec.live.len(), 6);

        let outstanding = s.teardown();
        let ids: HashSet<_> = outstanding.iter().copied().collect();
        let live: HashSet<_> = rec.live.keys().copied().collect();
        assert_eq!(ids, live);
        assert!(s.queues().is_empty());
        assert_eq!(s.phase(), SchedulePhase::Idle);

        for id in outstanding {
            rec.despawn(id);
        }
        let r = s.tick(10.0, &anchor, &mut rec);
        assert_eq!(r, TickReport::default());
    }

    #[test]
    fn placements_are_reproducible_per_seed() {
        #[derive(Default)]
        struct Positions(Vec<Vec3>);
        impl PrewarmSpawner for Positions {
            type Instance = u32;
            fn spawn_seed_object(&mut self, _p: usize, t: Transform) -> u32 {
                self.0.push(t.translation);
                0
            }
            fn spawn_mesh(&mut self, _m: usize, _mat: MaterialRef, t: Transform) -> u32 {
                self.0.push(t.translation);
                0
            }
            fn renderer_extent(&self, _r: usize) -> Option<Vec3> {
                None
            }
            fn spawn_renderer_clone(&mut self, _r: usize, _mat: MaterialRef, t: Transform) -> u32 {
                self.0.push(t.translation);
                0
            }
            fn spawn_light(&mut self, _l: usize, _rig: &LightRig) -> u32 {
                0
            }
            fn despawn(&mut self, _i: u32) {}
        }

        let run = || {
            let mut out = Positions::default();
            let mut s = scheduler(8);
            s.start(prefab_plan(8, 0));
            s.tick(1.0, &AnchorPose::default(), &mut out);
            out.0
        };
        let a = run();
        assert_eq!(a.len(), 8);
        assert_eq!(a, run());
        let volume = SpawnVolume::default();
        assert!(a.iter().all(|p| volume.contains(&AnchorPose::default(), *p)));
    }
}
