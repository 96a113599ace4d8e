// src/prewarm/lights.rs
//! Light subsets and per-type light rigs.
//! Every non-empty subset of the configured lights gets one tick so each
//! lighting permutation is seen by the spawned batch.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::placement::{AnchorPose, SpawnVolume};

/// Subsets are tracked as `u32` masks; more lights than this are ignored.
pub const MAX_PREWARM_LIGHTS: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

/// Non-empty set of light indices, ascending.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LightSubset {
    pub mask: u32,
    pub members: Vec<usize>,
}

impl LightSubset {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// All 2^n - 1 non-empty subsets of `n` lights: bitmask order 1..2^n, then a
/// stable sort by size (bitmask order breaks ties).
pub fn enumerate_light_subsets(n: usize) -> Vec<LightSubset> {
    let n = if n > MAX_PREWARM_LIGHTS {
        warn!(
            "Prewarm: {} lights configured, only the first {} take part in subsets",
            n, MAX_PREWARM_LIGHTS
        );
        MAX_PREWARM_LIGHTS
    } else {
        n
    };
    if n == 0 {
        return Vec::new();
    }

    let count = 1u32 << n;
    let mut subsets: Vec<LightSubset> = (1..count)
        .map(|mask| LightSubset {
            mask,
            members: (0..n).filter(|&j| mask & (1 << j) != 0).collect(),
        })
        .collect();
    subsets.sort_by_key(LightSubset::len);
    subsets
}

/// Type-specific parameters of a spawned prewarm light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightParams {
    Directional,
    Point { range: f32 },
    /// `cone_angle_deg` is the full cone aperture.
    Spot { range: f32, cone_angle_deg: f32 },
}

/// Transform + parameters for one transient light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightRig {
    pub transform: Transform,
    pub params: LightParams,
}

impl LightRig {
    /// Place and size a light so it covers the whole spawn volume.
    pub fn derive(kind: LightKind, anchor: &AnchorPose, volume: &SpawnVolume) -> Self {
        let center = volume.center(anchor);
        let hw = volume.half_width.abs();
        let hh = volume.half_height.abs();

        match kind {
            LightKind::Directional => Self {
                transform: Transform::from_translation(center + anchor.up * hh * 2.0)
                    .with_rotation(facing_down()),
                params: LightParams::Directional,
            },
            LightKind::Point => Self {
                transform: Transform::from_translation(center),
                params: LightParams::Point { range: hw.max(hh) * 1.5 },
            },
            LightKind::Spot => Self {
                transform: Transform::from_translation(center + anchor.up * hh * 2.05)
                    .with_rotation(facing_down()),
                params: LightParams::Spot {
                    range: hh * 2.1,
                    cone_angle_deg: hw.atan2(hh).to_degrees() * 2.0,
                },
            },
        }
    }
}

/// Lights shine along local -Z; tip that onto world -Y.
#[inline]
fn facing_down() -> Quat {
    Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn three_lights_yield_seven_subsets_in_size_then_mask_order() {
        let subsets = enumerate_light_subsets(3);
        let members: Vec<Vec<usize>> = subsets.iter().map(|s| s.members.clone()).collect();
        assert_eq!(
            members,
            vec![
                vec![0],
                vec![1],
                vec![2],
                vec![0, 1],
                vec![0, 2],
                vec![1, 2],
                vec![0, 1, 2],
            ]
        );
        let sizes: Vec<_> = subsets.iter().map(LightSubset::len).collect();
        assert_eq!(sizes, [1, 1, 1, 2, 2, 2, 3]);
    }

    #[test]
    fn subset_counts_and_uniqueness() {
        for n in 0..=12 {
            let subsets = enumerate_light_subsets(n);
            assert_eq!(subsets.len(), (1usize << n) - 1, "n = {n}");
            assert!(subsets.iter().all(|s| !s.is_empty()));
            assert!(subsets.windows(2).all(|w| w[0].len() <= w[1].len()));
            let masks: HashSet<_> = subsets.iter().map(|s| s.mask).collect();
            assert_eq!(masks.len(), subsets.len());
        }
    }

    #[test]
    fn twenty_lights_is_the_supported_maximum() {
        assert_eq!(enumerate_light_subsets(20).len(), (1 << 20) - 1);
        assert_eq!(enumerate_light_subsets(25).len(), (1 << 20) - 1);
    }

    #[test]
    fn point_light_range_covers_the_volume() {
        let volume = SpawnVolume { half_width: 10.0, half_height: 10.0, distance: 30.0 };
        let rig = LightRig::derive(LightKind::Point, &AnchorPose::default(), &volume);
        assert_eq!(rig.params, LightParams::Point { range: 15.0 });
        assert_eq!(rig.transform.translation, Vec3::new(0.0, 0.0, -30.0));
    }

    #[test]
    fn directional_light_sits_above_and_points_down() {
        let volume = SpawnVolume { half_width: 4.0, half_height: 3.0, distance: 10.0 };
        let rig = LightRig::derive(LightKind::Directional, &AnchorPose::default(), &volume);
        assert_eq!(rig.transform.translation, Vec3::new(0.0, 6.0, -10.0));
        assert!(rig.transform.forward().as_vec3().abs_diff_eq(Vec3::NEG_Y, 1e-5));
    }

    #[test]
    fn spot_light_cone_covers_the_volume() {
        let volume = SpawnVolume { half_width: 10.0, half_height: 10.0, distance: 30.0 };
        let rig = LightRig::derive(LightKind::Spot, &AnchorPose::default(), &volume);
        let LightParams::Spot { range, cone_angle_deg } = rig.params else {
            panic!("expected spot params");
        };
        assert!((range - 21.0).abs() < 1e-4);
        assert!((cone_angle_deg - 90.0).abs() < 1e-4);
        assert!((rig.transform.translation.y - 20.5).abs() < 1e-4);
        assert!(rig.transform.forward().as_vec3().abs_diff_eq(Vec3::NEG_Y, 1e-5));
    }
}
