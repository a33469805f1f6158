//! The loaded map graph and its spatial index.
//!
//! `MapGraph` owns the keyframe set and a k-d tree over keyframe positions.
//! It is mutated only at load time and by map merges; both paths re-index
//! atomically under the graph's write lock (held by the controller), so the
//! background local-map rebuild and snapshot readers always observe a
//! consistent keyframe set.

use std::sync::Arc;

use crate::algorithms::spatial::KeyframeIndex;
use crate::core::types::PointCloud3D;

use super::keyframe::KeyFrame;

/// Keyframe graph plus position index.
#[derive(Debug, Default)]
pub struct MapGraph {
    frames: Vec<Arc<KeyFrame>>,
    index: KeyframeIndex,
}

impl MapGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from loaded keyframes.
    pub fn from_frames(frames: Vec<Arc<KeyFrame>>) -> Self {
        let mut graph = Self {
            frames,
            index: KeyframeIndex::new(),
        };
        graph.reindex();
        graph
    }

    /// Number of keyframes.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Union additional keyframes into the graph and re-index.
    pub fn merge(&mut self, frames: Vec<Arc<KeyFrame>>) {
        self.frames.extend(frames);
        self.reindex();
    }

    /// Shared snapshot of all keyframes.
    ///
    /// Cloning `Arc`s is cheap; callers get a stable view that survives
    /// later merges.
    pub fn frames(&self) -> Vec<Arc<KeyFrame>> {
        self.frames.clone()
    }

    /// Keyframes whose positions lie within `radius` meters of `center`.
    pub fn frames_within(&self, center: &[f32; 3], radius: f32) -> Vec<Arc<KeyFrame>> {
        self.index
            .within_radius(center, radius)
            .into_iter()
            .map(|i| self.frames[i].clone())
            .collect()
    }

    /// Accumulate the full colorized map from keyframe fragments.
    ///
    /// Fragments are transformed into the map frame and unioned; color
    /// channels are carried when every fragment has one.
    pub fn color_map(&self) -> PointCloud3D {
        let mut out = PointCloud3D::new();
        for (i, kf) in self.frames.iter().enumerate() {
            let global = kf.global_cloud();
            if i == 0 {
                out = global;
            } else {
                out.extend_from(&global);
            }
        }
        out
    }

    fn reindex(&mut self) {
        let positions: Vec<[f32; 3]> = self.frames.iter().map(|f| f.position()).collect();
        self.index.rebuild(&positions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::pose::from_xyz_yaw;

    fn frame_at(id: u64, x: f64) -> Arc<KeyFrame> {
        Arc::new(KeyFrame::new(
            id,
            from_xyz_yaw(x, 0.0, 0.0, 0.0),
            PointCloud3D::from_points(vec![[0.0, 0.0, 0.0]]),
            id * 1000,
        ))
    }

    #[test]
    fn test_frames_within_radius() {
        let graph = MapGraph::from_frames(vec![frame_at(0, 0.0), frame_at(1, 3.0), frame_at(2, 50.0)]);

        let near = graph.frames_within(&[0.0, 0.0, 0.0], 5.0);
        assert_eq!(near.len(), 2);

        let far = graph.frames_within(&[1000.0, 0.0, 0.0], 5.0);
        assert!(far.is_empty());
    }

    #[test]
    fn test_merge_extends_index() {
        let mut graph = MapGraph::from_frames(vec![frame_at(0, 0.0)]);
        assert_eq!(graph.frames_within(&[40.0, 0.0, 0.0], 5.0).len(), 0);

        graph.merge(vec![frame_at(1, 40.0)]);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.frames_within(&[40.0, 0.0, 0.0], 5.0).len(), 1);
    }

    #[test]
    fn test_color_map_unions_fragments() {
        let graph = MapGraph::from_frames(vec![frame_at(0, 0.0), frame_at(1, 3.0)]);
        let map = graph.color_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map.points[1], [3.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_graph_color_map() {
        let graph = MapGraph::new();
        assert!(graph.color_map().is_empty());
    }
}
