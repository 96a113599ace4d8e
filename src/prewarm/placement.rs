// src/prewarm/placement.rs
//! Where prewarm objects go: a box in front of the anchor, randomized per spawn.

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// World-space frame objects are placed relative to (usually the camera).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorPose {
    pub origin: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub right: Vec3,
}

impl Default for AnchorPose {
    fn default() -> Self {
        Self { origin: Vec3::ZERO, forward: Vec3::NEG_Z, up: Vec3::Y, right: Vec3::X }
    }
}

impl AnchorPose {
    pub fn from_global(gt: &GlobalTransform) -> Self {
        Self {
            origin: gt.translation(),
            forward: *gt.forward(),
            up: *gt.up(),
            right: *gt.right(),
        }
    }
}

/// Spawn region: a `2*half_width` x `2*half_height` plane `distance` ahead of the anchor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnVolume {
    #[serde(default = "default_half_extent")]
    pub half_width: f32,
    #[serde(default = "default_half_extent")]
    pub half_height: f32,
    #[serde(default = "default_distance")]
    pub distance: f32,
}

fn default_half_extent() -> f32 {
    10.0
}
fn default_distance() -> f32 {
    30.0
}

impl Default for SpawnVolume {
    fn default() -> Self {
        Self {
            half_width: default_half_extent(),
            half_height: default_half_extent(),
            distance: default_distance(),
        }
    }
}

impl SpawnVolume {
    /// Center of the spawn plane.
    #[inline]
    pub fn center(&self, anchor: &AnchorPose) -> Vec3 {
        anchor.origin + anchor.forward * self.distance
    }

    /// Center plus independent lateral/vertical jitter within the half extents.
    pub fn random_point<R: Rng>(&self, anchor: &AnchorPose, rng: &mut R) -> Vec3 {
        let hw = self.half_width.abs();
        let hh = self.half_height.abs();
        let up = rng.random_range(-hh..=hh);
        let right = rng.random_range(-hw..=hw);
        self.center(anchor) + anchor.up * up + anchor.right * right
    }

    #[cfg(test)]
    pub fn contains(&self, anchor: &AnchorPose, p: Vec3) -> bool {
        let d = p - self.center(anchor);
        let eps = 1e-3;
        d.dot(anchor.forward).abs() <= eps
            && d.dot(anchor.up).abs() <= self.half_height.abs() + eps
            && d.dot(anchor.right).abs() <= self.half_width.abs() + eps
    }
}

/// Uniform scale that brings the largest axis of `extent` to 1 unit.
/// `None` for degenerate or non-finite extents.
pub fn unit_scale_for_extent(extent: Vec3) -> Option<f32> {
    let largest = extent.abs().max_element();
    if largest.is_finite() && largest > f32::EPSILON {
        Some(1.0 / largest)
    } else {
        None
    }
}
