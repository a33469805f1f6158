//! Rolling local map window.
//!
//! The local map is a bounded aggregate of the keyframe fragments near the
//! platform's current pose, used as the registration target for scan
//! matching. It is rebuilt off the hot path by the background window thread
//! and published by replacing a shared handle: readers clone an `Arc`
//! snapshot and never observe a partially built map.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::types::{PointCloud3D, Pose};

use super::graph::MapGraph;

/// Configuration for local map construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalMapConfig {
    /// Keyframe selection radius around the current pose (meters).
    /// Default: 50.0
    pub radius: f32,

    /// Voxel resolution for downsampling the unioned fragments (meters).
    /// Zero disables downsampling. Default: 0.25
    pub voxel_resolution: f32,
}

impl Default for LocalMapConfig {
    fn default() -> Self {
        Self {
            radius: 50.0,
            voxel_resolution: 0.25,
        }
    }
}

/// An immutable published local map.
///
/// `generation` increases with every publish, letting readers detect
/// refreshes without comparing clouds.
#[derive(Debug, Default)]
pub struct LocalMap {
    /// Unioned (optionally downsampled) map-frame cloud.
    pub cloud: PointCloud3D,
    /// Ids of the contributing keyframes.
    pub keyframe_ids: Vec<u64>,
    /// Pose the window was centered on.
    pub center: Option<Pose>,
    /// Publish generation, starting at 0 for the empty pre-init map.
    pub generation: u64,
}

impl LocalMap {
    /// Check whether the map holds any geometry.
    pub fn is_empty(&self) -> bool {
        self.cloud.is_empty()
    }
}

/// Shared handle to the latest published local map.
///
/// The lock is scoped strictly to the pointer swap/read; registration work
/// runs against the cloned `Arc` snapshot without holding it.
#[derive(Debug, Clone, Default)]
pub struct LocalMapHandle {
    inner: Arc<RwLock<Arc<LocalMap>>>,
}

impl LocalMapHandle {
    /// Create a handle holding an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a stable snapshot of the current map.
    pub fn snapshot(&self) -> Arc<LocalMap> {
        self.inner.read().clone()
    }

    /// Atomically replace the published map.
    pub fn publish(&self, map: Arc<LocalMap>) {
        *self.inner.write() = map;
    }
}

/// Build the local map for `center` from the graph.
///
/// Returns `None` when no keyframe lies within the configured radius (no
/// local map coverage); the caller keeps the previous map in place and
/// surfaces the condition instead of publishing an empty one.
pub fn build_local_map(
    graph: &MapGraph,
    center: &Pose,
    config: &LocalMapConfig,
    generation: u64,
) -> Option<LocalMap> {
    let t = center.translation.vector;
    let center_pos = [t.x as f32, t.y as f32, t.z as f32];
    let frames = graph.frames_within(&center_pos, config.radius);
    if frames.is_empty() {
        return None;
    }

    let mut cloud = PointCloud3D::new();
    let mut keyframe_ids = Vec::with_capacity(frames.len());
    for (i, kf) in frames.iter().enumerate() {
        keyframe_ids.push(kf.id);
        let global = kf.global_cloud();
        if i == 0 {
            cloud = global;
        } else {
            cloud.extend_from(&global);
        }
    }

    if config.voxel_resolution > 0.0 {
        cloud = cloud.voxel_downsampled(config.voxel_resolution);
    }

    Some(LocalMap {
        cloud,
        keyframe_ids,
        center: Some(*center),
        generation,
    })
}
