//! 3D point cloud types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::pose::Pose;

/// A 3D point cloud with optional intensity and color channels.
///
/// Point order is preserved: correspondence sets produced by the fitness
/// estimator are indices into `points`. Clouds captured from a sensor frame
/// are treated as immutable; transforms produce new clouds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloud3D {
    /// Point positions in meters.
    pub points: Vec<[f32; 3]>,
    /// Optional per-point intensity (sensor units).
    pub intensities: Option<Vec<f32>>,
    /// Optional per-point RGB color, used by the colorized map snapshot.
    pub colors: Option<Vec<[u8; 3]>>,
}

impl PointCloud3D {
    /// Create an empty cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            intensities: None,
            colors: None,
        }
    }

    /// Build a cloud from bare positions.
    pub fn from_points(points: Vec<[f32; 3]>) -> Self {
        Self {
            points,
            intensities: None,
            colors: None,
        }
    }

    /// Attach an intensity channel.
    pub fn with_intensities(mut self, intensities: Vec<f32>) -> Self {
        self.intensities = Some(intensities);
        self
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Append a point.
    #[inline]
    pub fn push(&mut self, point: [f32; 3]) {
        self.points.push(point);
    }

    /// Transform every point by a rigid pose, producing a new cloud.
    ///
    /// Auxiliary channels are carried through unchanged.
    pub fn transform(&self, pose: &Pose) -> PointCloud3D {
        let pose_f = pose.cast::<f32>();
        let points = self
            .points
            .iter()
            .map(|p| {
                let q = pose_f * nalgebra::Point3::new(p[0], p[1], p[2]);
                [q.x, q.y, q.z]
            })
            .collect();
        PointCloud3D {
            points,
            intensities: self.intensities.clone(),
            colors: self.colors.clone(),
        }
    }

    /// Append another cloud's points (and matching channels) to this one.
    ///
    /// A channel is kept only when both clouds carry it; a union of a cloud
    /// with and one without intensities drops the channel rather than
    /// misaligning it.
    pub fn extend_from(&mut self, other: &PointCloud3D) {
        self.points.extend_from_slice(&other.points);
        match (&mut self.intensities, &other.intensities) {
            (Some(dst), Some(src)) => dst.extend_from_slice(src),
            (channel, _) => *channel = None,
        }
        match (&mut self.colors, &other.colors) {
            (Some(dst), Some(src)) => dst.extend_from_slice(src),
            (channel, _) => *channel = None,
        }
    }

    /// Voxel-grid downsample: one centroid per occupied voxel.
    ///
    /// Auxiliary channels are dropped; the local map only needs geometry.
    pub fn voxel_downsampled(&self, resolution: f32) -> PointCloud3D {
        if resolution <= 0.0 || self.points.is_empty() {
            return PointCloud3D::from_points(self.points.clone());
        }

        let inv = 1.0 / resolution;
        let mut voxels: HashMap<(i32, i32, i32), ([f64; 3], u32)> = HashMap::new();
        for p in &self.points {
            let key = (
                (p[0] * inv).floor() as i32,
                (p[1] * inv).floor() as i32,
                (p[2] * inv).floor() as i32,
            );
            let entry = voxels.entry(key).or_insert(([0.0; 3], 0));
            entry.0[0] += p[0] as f64;
            entry.0[1] += p[1] as f64;
            entry.0[2] += p[2] as f64;
            entry.1 += 1;
        }

        let points = voxels
            .values()
            .map(|(sum, n)| {
                let n = *n as f64;
                [
                    (sum[0] / n) as f32,
                    (sum[1] / n) as f32,
                    (sum[2] / n) as f32,
                ]
            })
            .collect();
        PointCloud3D::from_points(points)
    }
}
