//! Capability interfaces at the localization seams.
//!
//! The scan matcher and the global relocalizer are external collaborators
//! consumed through small traits, and the session itself is exposed through
//! [`LocalizationBackend`] so callers can hold a mapping-mode or
//! localization-mode session behind one interface object. No inheritance
//! chains: one trait, concrete variants.

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::Matrix6;

use crate::algorithms::fitness::AnomalyInliers;
use crate::core::types::{ImageFrame, ImuSample, InsFix, PointCloud3D, Pose, PoseRange, Timestamped};
use crate::error::Result;

/// Result of one Localizer invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalizerEstimate {
    /// Estimated transform taking the scan into the local-map (= map) frame.
    pub pose: Pose,
    /// Whether the matcher converged. A non-converged estimate is judged a
    /// registration failure regardless of its fitness.
    pub converged: bool,
}

/// Scan-matching capability, consumed once per frame while tracking.
///
/// Implementations own their internal state (previous alignment, voxel
/// structures, ...); the controller only supplies the current local map,
/// the scan, and a motion prior as the initial guess.
pub trait Localizer: Send {
    /// Align `scan` against `local_map`, starting from `prior`.
    fn estimate(
        &mut self,
        local_map: &PointCloud3D,
        scan: &PointCloud3D,
        prior: &Pose,
    ) -> LocalizerEstimate;
}

/// Global relocalization capability: full-search pose recovery without a
/// prior, consumed when tracking is lost.
pub trait GlobalLocator: Send {
    /// Estimate an absolute pose for `scan` within `search`.
    ///
    /// `None` means the search failed; the controller retries on later
    /// frames.
    fn relocalize(&mut self, scan: &PointCloud3D, search: &PoseRange) -> Option<Pose>;
}

/// Session state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    /// `init` has not run.
    #[default]
    Uninitialized,
    /// Initialized, waiting for a seed and the first registration.
    Initializing,
    /// Normal per-frame tracking.
    Tracking,
    /// One or more consecutive registration failures.
    Degraded,
    /// Failure streak exceeded the limit; recovering via the GlobalLocator.
    Relocalizing,
    /// Terminal until an explicit external reset.
    Failed,
}

/// Per-frame outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Initializing without a seed pose or search range yet.
    AwaitingSeed,
    /// Registration accepted; pose updated.
    Tracked,
    /// Registration failed (non-convergence or fitness above threshold).
    RegistrationFailed,
    /// GlobalLocator recovered a pose this frame.
    Relocalized,
    /// GlobalLocator failed this frame; will retry.
    RelocalizationFailed,
    /// No usable local map this frame (outside coverage or not yet built).
    NoLocalMapCoverage,
}

/// Result of one `feed_point_data` call.
#[derive(Debug, Clone)]
pub struct FrameResult {
    /// What happened this frame.
    pub status: FrameStatus,
    /// State after processing the frame.
    pub state: TrackingState,
    /// Accepted pose, when `status` is `Tracked` or `Relocalized`.
    pub pose: Option<Timestamped<Pose>>,
    /// Fitness score of the accepted or rejected registration.
    pub fitness: Option<f64>,
    /// Information matrix of an accepted registration.
    pub information: Option<Matrix6<f64>>,
    /// Scan indices flagged as vertical-discontinuity correspondences.
    pub anomaly_inliers: AnomalyInliers,
    /// Consecutive registration failures since the last success.
    pub consecutive_failures: u32,
    /// Whether the local-map window currently has keyframe coverage.
    pub local_map_coverage: bool,
}

/// The session capability surface shared by mapping- and localization-mode
/// backends.
pub trait LocalizationBackend {
    /// Session configuration type.
    type Config;

    /// Validate configuration, load resources, and start background work.
    fn init(&mut self, config: Self::Config) -> Result<()>;

    /// Whether `init` has completed.
    fn is_inited(&self) -> bool;

    /// Supply a seed pose for the first registration.
    fn set_init_pose(&mut self, pose: Pose) -> Result<()>;

    /// Supply a search region for seedless initialization.
    fn set_init_pose_range(&mut self, range: PoseRange) -> Result<()>;

    /// Ingest an INS/GNSS fix (motion prior only; no state transitions).
    fn feed_ins_data(&mut self, fix: InsFix);

    /// Ingest an IMU sample (motion prior only; no state transitions).
    fn feed_imu_data(&mut self, imu: ImuSample);

    /// Store the latest camera frames for downstream consumers.
    fn feed_image_data(&mut self, timestamp_us: u64, images: &HashMap<String, ImageFrame>);

    /// Process one sensor frame of named point-cloud streams.
    fn feed_point_data(
        &mut self,
        timestamp_us: u64,
        clouds: &HashMap<String, Arc<PointCloud3D>>,
    ) -> Result<FrameResult>;

    /// Most recent pose estimate.
    fn get_pose(&self) -> Result<Timestamped<Pose>>;

    /// Pose at a timestamp within the retained history.
    fn get_timed_pose(&self, timestamp_us: u64) -> Result<Pose>;

    /// Pose at an INS fix's timestamp.
    fn get_timed_pose_ins(&self, fix: &InsFix) -> Result<Pose>;

    /// Tear down background work. Idempotent; safe without `init`.
    fn shutdown(&mut self);
}
