//! Owned spatial indexes for nearest-neighbor search.
//!
//! Two k-d tree wrappers back the localization core:
//!
//! - [`CloudIndex`]: nearest-neighbor lookup over a reference point cloud,
//!   used by the fitness estimator to find scan-to-map correspondences.
//! - [`KeyframeIndex`]: radius and nearest queries over keyframe positions,
//!   used to select the map region near the current pose.
//!
//! Both are owned, explicitly-lifetimed instances: the index answers queries
//! against the cloud it was last rebuilt from, and the caller must call
//! `rebuild` whenever the reference data changes. There is no shared
//! process-wide tree.

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;

use crate::core::types::PointCloud3D;

/// Bucket size for the k-d trees.
///
/// Increased from kiddo's default of 32 to handle planar/collinear point
/// clouds (e.g. a ground-plane scan with many points sharing one axis
/// value), which otherwise panic during tree construction.
const BUCKET_SIZE: usize = 1024;

/// Owned k-d tree type with an enlarged bucket size.
type Tree = KdTree<f32, u64, 3, BUCKET_SIZE, u32>;

/// A nearest-neighbor match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index of the matched point in the indexed cloud.
    pub index: usize,
    /// Squared Euclidean distance to the match, in m².
    pub dist_sq: f32,
}

/// K-d tree over a reference point cloud.
#[derive(Debug)]
pub struct CloudIndex {
    tree: Tree,
    len: usize,
}

impl Default for CloudIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudIndex {
    /// Create an empty index. Queries return `None` until `rebuild` is
    /// called with a non-empty cloud.
    pub fn new() -> Self {
        Self {
            tree: KdTree::new(),
            len: 0,
        }
    }

    /// Build an index over `cloud` in one step.
    pub fn build(cloud: &PointCloud3D) -> Self {
        let mut index = Self::new();
        index.rebuild(cloud);
        index
    }

    /// Re-index a new reference cloud, discarding the previous tree.
    pub fn rebuild(&mut self, cloud: &PointCloud3D) {
        let mut tree: Tree = KdTree::with_capacity(cloud.len());
        for (i, p) in cloud.points.iter().enumerate() {
            tree.add(p, i as u64);
        }
        self.tree = tree;
        self.len = cloud.len();
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Nearest indexed point to `query`, or `None` when the index is empty.
    pub fn nearest(&self, query: &[f32; 3]) -> Option<Neighbor> {
        if self.len == 0 {
            return None;
        }
        let found = self.tree.nearest_one::<SquaredEuclidean>(query);
        Some(Neighbor {
            index: found.item as usize,
            dist_sq: found.distance,
        })
    }
}

/// K-d tree over a set of 3D positions (keyframe translations).
#[derive(Debug)]
pub struct KeyframeIndex {
    tree: Tree,
    len: usize,
}

impl Default for KeyframeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyframeIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            tree: KdTree::new(),
            len: 0,
        }
    }

    /// Re-index keyframe positions; entry order defines the returned ids.
    pub fn rebuild(&mut self, positions: &[[f32; 3]]) {
        let mut tree: Tree = KdTree::with_capacity(positions.len());
        for (i, p) in positions.iter().enumerate() {
            tree.add(p, i as u64);
        }
        self.tree = tree;
        self.len = positions.len();
    }

    /// Number of indexed positions.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Indices of all keyframes within `radius` meters of `center`,
    /// nearest first.
    pub fn within_radius(&self, center: &[f32; 3], radius: f32) -> Vec<usize> {
        if self.len == 0 {
            return Vec::new();
        }
        self.tree
            .within::<SquaredEuclidean>(center, radius * radius)
            .into_iter()
            .map(|n| n.item as usize)
            .collect()
    }

    /// Index of the nearest keyframe to `center`.
    pub fn nearest(&self, center: &[f32; 3]) -> Option<Neighbor> {
        if self.len == 0 {
            return None;
        }
        let found = self.tree.nearest_one::<SquaredEuclidean>(center);
        Some(Neighbor {
            index: found.item as usize,
            dist_sq: found.distance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cloud_index_nearest() {
        let cloud = PointCloud3D::from_points(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 2.0, 0.0],
        ]);
        let index = CloudIndex::build(&cloud);

        let n = index.nearest(&[0.9, 0.1, 0.0]).unwrap();
        assert_eq!(n.index, 1);
        assert_relative_eq!(n.dist_sq, 0.02, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_index_returns_none() {
        let index = CloudIndex::new();
        assert!(index.nearest(&[0.0; 3]).is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_rebuild_replaces_contents() {
        let mut index = CloudIndex::new();
        index.rebuild(&PointCloud3D::from_points(vec![[0.0; 3]]));
        assert_eq!(index.nearest(&[5.0, 5.0, 5.0]).unwrap().index, 0);

        index.rebuild(&PointCloud3D::from_points(vec![[5.0, 5.0, 5.0], [9.0; 3]]));
        let n = index.nearest(&[5.0, 5.0, 5.0]).unwrap();
        assert_eq!(n.index, 0);
        assert_relative_eq!(n.dist_sq, 0.0);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_keyframe_index_radius() {
        let mut index = KeyframeIndex::new();
        index.rebuild(&[
            [0.0, 0.0, 0.0],
            [3.0, 0.0, 0.0],
            [50.0, 0.0, 0.0],
        ]);

        let hits = index.within_radius(&[0.0, 0.0, 0.0], 5.0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], 0);
        assert!(hits.contains(&1));

        let none = index.within_radius(&[100.0, 100.0, 0.0], 1.0);
        assert!(none.is_empty());
    }

    #[test]
    fn test_keyframe_index_nearest() {
        let mut index = KeyframeIndex::new();
        index.rebuild(&[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]]);
        assert_eq!(index.nearest(&[8.0, 0.0, 0.0]).unwrap().index, 1);
        assert!(KeyframeIndex::new().nearest(&[0.0; 3]).is_none());
    }
}
