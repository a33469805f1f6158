//! Registration fitness scoring and information-matrix estimation.
//!
//! Converts a finished scan-to-map alignment into a quantitative confidence
//! measure for the downstream pose-graph optimizer:
//!
//! 1. **Fitness score**: mean squared nearest-neighbor distance between the
//!    aligned scan and the reference cloud, under an occlusion cutoff.
//! 2. **Variance weighting**: a bounded monotone curve maps the fitness
//!    score to a variance in `[min_var, max_var]`; translation and rotation
//!    blocks are weighted independently.
//! 3. **Information matrix**: `diag(1/w_t · I₃, 1/w_r · I₃)`, the inverse
//!    covariance consumed by the graph backend.
//!
//! The estimator additionally flags *anomaly inliers*: scan-to-map
//! correspondences that are close horizontally but separated vertically near
//! ground level, the signature of curbs and small obstacles that the map
//! does not carry.

use nalgebra::Matrix6;
use serde::{Deserialize, Serialize};

use crate::algorithms::spatial::CloudIndex;
use crate::core::types::{PointCloud3D, Pose};

/// Scan-point indices flagged as vertical-discontinuity correspondences.
pub type AnomalyInliers = Vec<usize>;

/// Configuration for [`InformationEstimator`].
///
/// The numeric shape of the fitness-to-variance curve and the anomaly
/// thresholds are tunable; the defaults are field-tuned values. The binding
/// contract is the bounds and monotonicity, not the exact curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InformationEstimatorConfig {
    /// Use a fixed information matrix instead of fitness-derived weights.
    /// Default: false
    pub use_const_information: bool,

    /// Constant-mode translation standard deviation (meters).
    /// Default: 0.5
    pub const_stddev_x: f64,

    /// Constant-mode rotation standard deviation (radians).
    /// Default: 0.1
    pub const_stddev_q: f64,

    /// Steepness of the fitness-to-variance curve.
    /// Default: 20.0
    pub var_gain: f64,

    /// Fitness score at which the curve approaches its upper bound.
    /// Scores above this are treated as failed registrations by the
    /// controller. Default: 0.5
    pub fitness_score_thresh: f64,

    /// Translation stddev at perfect fit (meters). Default: 0.1
    pub min_stddev_x: f64,

    /// Translation stddev at worst fit (meters). Default: 5.0
    pub max_stddev_x: f64,

    /// Rotation stddev at perfect fit (radians). Default: 0.05
    pub min_stddev_q: f64,

    /// Rotation stddev at worst fit (radians). Default: 0.2
    pub max_stddev_q: f64,

    /// Squared horizontal distance below which a correspondence is a
    /// candidate anomaly inlier (m²). Default: 10.0
    pub anomaly_horizontal_radius_sq: f32,

    /// Height band above the floor inside which anomalies are considered
    /// (meters). Default: 2.0
    pub anomaly_floor_margin: f32,

    /// Minimum vertical separation for an anomaly inlier (meters).
    /// Default: 0.25
    pub anomaly_min_vertical_gap: f32,
}

impl Default for InformationEstimatorConfig {
    fn default() -> Self {
        Self {
            use_const_information: false,
            const_stddev_x: 0.5,
            const_stddev_q: 0.1,
            var_gain: 20.0,
            fitness_score_thresh: 0.5,
            min_stddev_x: 0.1,
            max_stddev_x: 5.0,
            min_stddev_q: 0.05,
            max_stddev_q: 0.2,
            anomaly_horizontal_radius_sq: 10.0,
            anomaly_floor_margin: 2.0,
            anomaly_min_vertical_gap: 0.25,
        }
    }
}

/// Registration fitness / information estimator.
///
/// Owns the k-d tree used for correspondence lookups in
/// [`fitness_with_inliers`](Self::fitness_with_inliers). The owner must call
/// [`rebuild_index`](Self::rebuild_index) whenever the reference cloud
/// changes; querying against a stale index is a caller error and is not
/// detected.
#[derive(Debug, Default)]
pub struct InformationEstimator {
    config: InformationEstimatorConfig,
    index: CloudIndex,
}

impl InformationEstimator {
    /// Create an estimator with the given configuration.
    pub fn new(config: InformationEstimatorConfig) -> Self {
        Self {
            config,
            index: CloudIndex::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &InformationEstimatorConfig {
        &self.config
    }

    /// Re-index the reference cloud used by
    /// [`fitness_with_inliers`](Self::fitness_with_inliers).
    pub fn rebuild_index(&mut self, reference: &PointCloud3D) {
        self.index.rebuild(reference);
    }

    /// Mean squared nearest-neighbor distance from `scan` (transformed by
    /// `relative_pose`) to `map`.
    ///
    /// Correspondences with squared distance above `max_range_sq` are
    /// excluded as occlusions (scan points with no real counterpart in an
    /// incomplete map). Returns [`f64::MAX`] when no correspondence is
    /// accepted.
    pub fn fitness_score(
        map: &PointCloud3D,
        scan: &PointCloud3D,
        relative_pose: &Pose,
        max_range_sq: f64,
    ) -> f64 {
        let index = CloudIndex::build(map);
        let transformed = scan.transform(relative_pose);

        let mut sum = 0.0f64;
        let mut accepted = 0usize;
        for p in &transformed.points {
            if let Some(n) = index.nearest(p) {
                let d = n.dist_sq as f64;
                if d <= max_range_sq {
                    sum += d;
                    accepted += 1;
                }
            }
        }

        if accepted > 0 {
            sum / accepted as f64
        } else {
            f64::MAX
        }
    }

    /// Bounded monotone mapping from fitness score to variance.
    ///
    /// `(1 - e^(-gain·x)) / (1 - e^(-gain·thresh))` rescaled into
    /// `[min_var, max_var]` and clamped at the bounds. A worse fit (larger
    /// score) always yields an equal or larger variance.
    pub fn weight(gain: f64, thresh: f64, min_var: f64, max_var: f64, fitness: f64) -> f64 {
        let y = (1.0 - (-gain * fitness).exp()) / (1.0 - (-gain * thresh).exp());
        min_var + (max_var - min_var) * y.clamp(0.0, 1.0)
    }

    /// 6×6 diagonal information matrix for a registration of `scan` against
    /// `map` under `relative_pose`.
    ///
    /// In constant mode the result is a fixed matrix independent of the
    /// inputs; otherwise translation and rotation variances are derived
    /// independently from the fitness score.
    pub fn information_matrix(
        &self,
        map: &PointCloud3D,
        scan: &PointCloud3D,
        relative_pose: &Pose,
    ) -> Matrix6<f64> {
        if self.config.use_const_information {
            return self.const_information_matrix();
        }

        let fitness = Self::fitness_score(map, scan, relative_pose, f64::MAX);
        self.information_matrix_for_fitness(fitness)
    }

    /// Information matrix for an already computed fitness score.
    ///
    /// Lets the controller reuse the per-frame fitness instead of paying a
    /// second correspondence pass.
    pub fn information_matrix_for_fitness(&self, fitness: f64) -> Matrix6<f64> {
        if self.config.use_const_information {
            return self.const_information_matrix();
        }

        let c = &self.config;
        let min_var_x = c.min_stddev_x * c.min_stddev_x;
        let max_var_x = c.max_stddev_x * c.max_stddev_x;
        let min_var_q = c.min_stddev_q * c.min_stddev_q;
        let max_var_q = c.max_stddev_q * c.max_stddev_q;

        let w_x = Self::weight(c.var_gain, c.fitness_score_thresh, min_var_x, max_var_x, fitness);
        let w_q = Self::weight(c.var_gain, c.fitness_score_thresh, min_var_q, max_var_q, fitness);

        let mut inf = Matrix6::identity();
        for i in 0..3 {
            inf[(i, i)] = 1.0 / w_x;
            inf[(i + 3, i + 3)] = 1.0 / w_q;
        }
        inf
    }

    /// The fixed diagonal matrix used in constant mode.
    pub fn const_information_matrix(&self) -> Matrix6<f64> {
        let mut inf = Matrix6::identity();
        for i in 0..3 {
            inf[(i, i)] = 1.0 / self.config.const_stddev_x;
            inf[(i + 3, i + 3)] = 1.0 / self.config.const_stddev_q;
        }
        inf
    }

    /// Fitness score plus anomaly-inlier detection, against the owned index.
    ///
    /// The index must have been rebuilt from `map` (see
    /// [`rebuild_index`](Self::rebuild_index)). Every scan point is
    /// transformed into the map frame by `relative_pose` and matched to its
    /// nearest map point; the scan index is flagged as an anomaly inlier
    /// when the pair is within the horizontal radius, both points sit below
    /// `floor_height` plus the configured margin, and their vertical
    /// separation exceeds the configured gap.
    ///
    /// Returns the fitness score (with the same occlusion cutoff and
    /// sentinel as [`fitness_score`](Self::fitness_score)) and the flagged
    /// indices into `scan`.
    pub fn fitness_with_inliers(
        &self,
        map: &PointCloud3D,
        scan: &PointCloud3D,
        relative_pose: &Pose,
        floor_height: f32,
        max_range_sq: f64,
    ) -> (f64, AnomalyInliers) {
        let mut inliers = Vec::new();
        if self.index.is_empty() {
            return (f64::MAX, inliers);
        }

        let transformed = scan.transform(relative_pose);
        let floor_ceiling = floor_height + self.config.anomaly_floor_margin;

        let mut sum = 0.0f64;
        let mut accepted = 0usize;
        for (i, p) in transformed.points.iter().enumerate() {
            let n = match self.index.nearest(p) {
                Some(n) => n,
                None => continue,
            };

            let d = n.dist_sq as f64;
            if d <= max_range_sq {
                sum += d;
                accepted += 1;
            }

            // Both points are in the map frame here: the matched map point
            // natively, the scan point via relative_pose.
            let m = &map.points[n.index];
            let dx = m[0] - p[0];
            let dy = m[1] - p[1];
            let horizontal_sq = dx * dx + dy * dy;
            if horizontal_sq <= self.config.anomaly_horizontal_radius_sq
                && m[2] < floor_ceiling
                && p[2] < floor_ceiling
                && (m[2] - p[2]).abs() > self.config.anomaly_min_vertical_gap
            {
                inliers.push(i);
            }
        }

        let fitness = if accepted > 0 {
            sum / accepted as f64
        } else {
            f64::MAX
        };
        (fitness, inliers)
    }
}
