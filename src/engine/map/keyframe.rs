//! Keyframes of the persisted map graph.
//!
//! A keyframe is a node of the prebuilt map: a timestamped pose plus the
//! point-cloud fragment captured there. Keyframes are owned by the map graph
//! and shared read-only (`Arc`) with the local-map builder and snapshot
//! consumers.

use std::path::Path;
use std::sync::Arc;

use crate::core::types::{PointCloud3D, Pose};
use crate::error::Result;

/// A node of the map graph: pose + point-cloud fragment.
#[derive(Debug, Clone)]
pub struct KeyFrame {
    /// Unique identifier within the graph.
    pub id: u64,

    /// Pose of the fragment origin in the map frame.
    pub pose: Pose,

    /// Point cloud in keyframe-local frame.
    pub cloud: PointCloud3D,

    /// Capture timestamp (microseconds).
    pub timestamp_us: u64,
}

impl KeyFrame {
    /// Create a new keyframe.
    pub fn new(id: u64, pose: Pose, cloud: PointCloud3D, timestamp_us: u64) -> Self {
        Self {
            id,
            pose,
            cloud,
            timestamp_us,
        }
    }

    /// Keyframe position in the map frame, as a k-d tree entry.
    #[inline]
    pub fn position(&self) -> [f32; 3] {
        let t = self.pose.translation.vector;
        [t.x as f32, t.y as f32, t.z as f32]
    }

    /// The fragment transformed into the map frame.
    pub fn global_cloud(&self) -> PointCloud3D {
        self.cloud.transform(&self.pose)
    }
}

/// Map persistence capability.
///
/// The on-disk format is out of scope; a loader turns a map directory into
/// keyframes. Each session owns its loader; there is no process-wide map
/// singleton.
pub trait MapLoader: Send {
    /// Load all keyframes from `directory`.
    fn load(&self, directory: &Path) -> Result<Vec<Arc<KeyFrame>>>;
}
