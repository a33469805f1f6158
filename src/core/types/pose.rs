//! Rigid 3D pose type and helpers.
//!
//! A pose is a rigid transform (rotation + translation) used both as the
//! platform pose in the map frame and as the relative transform between two
//! point clouds. `nalgebra::Isometry3<f64>` keeps the rotation orthonormal
//! by construction.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::Timestamped;

/// Rigid 3D transform: rotation + translation.
pub type Pose = Isometry3<f64>;

/// Identity pose at the origin.
#[inline]
pub fn identity() -> Pose {
    Pose::identity()
}

/// Build a pose from a translation and yaw angle (radians, about +Z).
///
/// Convenience for seeding and tests; full 6-DOF poses come from the
/// Localizer.
#[inline]
pub fn from_xyz_yaw(x: f64, y: f64, z: f64, yaw: f64) -> Pose {
    Pose::from_parts(
        Translation3::new(x, y, z),
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw),
    )
}

/// Relative transform taking `from` to `to`: `from⁻¹ ∘ to`.
#[inline]
pub fn delta(from: &Pose, to: &Pose) -> Pose {
    from.inv_mul(to)
}

/// Interpolate between two timestamped poses.
///
/// Returns the pose at `target_us`, or `None` when `target_us` falls outside
/// `[start, end]`. Translation is interpolated linearly, rotation by
/// quaternion slerp (shortest path).
pub fn interpolate(
    start: &Timestamped<Pose>,
    end: &Timestamped<Pose>,
    target_us: u64,
) -> Option<Pose> {
    if target_us < start.timestamp_us || target_us > end.timestamp_us {
        return None;
    }

    if start.timestamp_us == end.timestamp_us {
        return Some(start.data);
    }

    let t = (target_us - start.timestamp_us) as f64
        / (end.timestamp_us - start.timestamp_us) as f64;

    let translation = start.data.translation.vector.lerp(&end.data.translation.vector, t);
    let rotation = start.data.rotation.slerp(&end.data.rotation, t);

    Some(Pose::from_parts(Translation3::from(translation), rotation))
}

/// Allowed search bounds for the initial pose.
///
/// Consumed by the GlobalLocator when localization starts without a seed
/// pose, and used to validate a supplied seed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseRange {
    /// Minimum x in meters
    pub x_min: f64,
    /// Maximum x in meters
    pub x_max: f64,
    /// Minimum y in meters
    pub y_min: f64,
    /// Maximum y in meters
    pub y_max: f64,
    /// Minimum z in meters
    pub z_min: f64,
    /// Maximum z in meters
    pub z_max: f64,
}

impl PoseRange {
    /// Create a new range. Bounds are not validated here; see [`Self::validate`].
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64, z_min: f64, z_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
            z_min,
            z_max,
        }
    }

    /// Check that every axis has `min <= max` and all bounds are finite.
    pub fn validate(&self) -> bool {
        let finite = [
            self.x_min, self.x_max, self.y_min, self.y_max, self.z_min, self.z_max,
        ]
        .iter()
        .all(|v| v.is_finite());
        finite && self.x_min <= self.x_max && self.y_min <= self.y_max && self.z_min <= self.z_max
    }

    /// Check whether a pose's translation lies inside the range.
    pub fn contains(&self, pose: &Pose) -> bool {
        let t = pose.translation.vector;
        t.x >= self.x_min
            && t.x <= self.x_max
            && t.y >= self.y_min
            && t.y <= self.y_max
            && t.z >= self.z_min
            && t.z <= self.z_max
    }

    /// Center of the range, used as a relocalization search seed.
    pub fn center(&self) -> Vector3<f64> {
        Vector3::new(
            (self.x_min + self.x_max) * 0.5,
            (self.y_min + self.y_max) * 0.5,
            (self.z_min + self.z_max) * 0.5,
        )
    }
}
