//! Motion prior for seeding the per-frame registration.
//!
//! INS fixes and IMU samples never trigger state transitions; they only
//! shape the prediction handed to the Localizer as its initial guess. The
//! prediction combines constant-velocity extrapolation from the last two
//! tracked poses with gyro integration since the last track.

use nalgebra::{Translation3, UnitQuaternion, Vector3};

use crate::core::types::{pose, ImuSample, InsFix, InsStatus, Pose, Timestamped};

/// Prediction state fed by auxiliary sensors and tracked poses.
#[derive(Debug)]
pub struct MotionPredictor {
    last_pose: Option<Timestamped<Pose>>,
    /// Map-frame velocity from the last two tracked poses (m/s).
    velocity: Option<Vector3<f64>>,
    /// Rotation integrated from gyro samples since the last tracked pose.
    gyro_delta: UnitQuaternion<f64>,
    last_imu_us: Option<u64>,
    last_fix: Option<InsFix>,
}

impl Default for MotionPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionPredictor {
    /// Create an empty predictor.
    pub fn new() -> Self {
        Self {
            last_pose: None,
            velocity: None,
            gyro_delta: UnitQuaternion::identity(),
            last_imu_us: None,
            last_fix: None,
        }
    }

    /// Ingest an INS/GNSS fix.
    pub fn feed_ins(&mut self, fix: InsFix) {
        self.last_fix = Some(fix);
    }

    /// Ingest an IMU sample, integrating angular velocity.
    pub fn feed_imu(&mut self, imu: ImuSample) {
        if let Some(prev_us) = self.last_imu_us {
            if imu.timestamp_us > prev_us {
                let dt = (imu.timestamp_us - prev_us) as f64 * 1e-6;
                let omega = Vector3::new(imu.gyro[0], imu.gyro[1], imu.gyro[2]);
                self.gyro_delta =
                    self.gyro_delta * UnitQuaternion::from_scaled_axis(omega * dt);
            }
        }
        self.last_imu_us = Some(imu.timestamp_us);
    }

    /// Record a tracked pose, updating the velocity estimate and resetting
    /// the gyro accumulator.
    pub fn observe(&mut self, tracked: Timestamped<Pose>) {
        if let Some(prev) = &self.last_pose {
            if tracked.timestamp_us > prev.timestamp_us {
                let dt = (tracked.timestamp_us - prev.timestamp_us) as f64 * 1e-6;
                let dp = tracked.data.translation.vector - prev.data.translation.vector;
                self.velocity = Some(dp / dt);
            }
        }
        self.last_pose = Some(tracked);
        self.gyro_delta = UnitQuaternion::identity();
    }

    /// Predicted pose at `timestamp_us`.
    ///
    /// Prefers extrapolation from the last tracked pose; falls back to a
    /// usable INS fix when tracking has not started. `None` when neither is
    /// available.
    pub fn predict(&self, timestamp_us: u64) -> Option<Pose> {
        if let Some(last) = &self.last_pose {
            let dt = timestamp_us.saturating_sub(last.timestamp_us) as f64 * 1e-6;
            let translation = match &self.velocity {
                Some(v) => last.data.translation.vector + v * dt,
                None => last.data.translation.vector,
            };
            let rotation = last.data.rotation * self.gyro_delta;
            return Some(Pose::from_parts(Translation3::from(translation), rotation));
        }

        match &self.last_fix {
            Some(fix) if fix.status != InsStatus::Invalid => {
                Some(pose::from_xyz_yaw(fix.x, fix.y, fix.z, fix.yaw))
            }
            _ => None,
        }
    }

    /// Drop all prediction state (after reseeding or relocalization).
    pub fn reset(&mut self) {
        self.last_pose = None;
        self.velocity = None;
        self.gyro_delta = UnitQuaternion::identity();
        self.last_imu_us = None;
    }
}
