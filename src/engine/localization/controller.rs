//! The localization session controller.
//!
//! Owns the session state machine, drives per-frame pose estimation through
//! the external Localizer, converts each alignment into an information
//! matrix, maintains the failure streak, and falls back to the external
//! GlobalLocator when tracking is lost.
//!
//! # State Machine
//!
//! ```text
//! Uninitialized ──init──▶ Initializing ──first registration──▶ Tracking
//!                                                                │  ▲
//!                                                     failure    │  │ success
//!                                                                ▼  │
//!                                                              Degraded
//!                                                                │
//!                                                  streak > limit│
//!                                                                ▼
//!                     Tracking ◀──GlobalLocator success── Relocalizing ─┐
//!                                                                ▲      │ failure
//!                                                                └──────┘
//! ```
//!
//! `Failed` is terminal, entered only through [`LocalizationController::fail`]
//! and left only through [`LocalizationController::reset`].
//!
//! Concurrency: this type runs on the caller's sensor-feed thread. The only
//! shared structures are the local-map handle (snapshot/swap), the pose
//! queue, and the graph lock; the per-frame path never blocks on a map
//! rebuild.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;

use crate::algorithms::fitness::{InformationEstimator, InformationEstimatorConfig};
use crate::core::types::{
    ImageFrame, ImuSample, InsFix, PointCloud3D, Pose, PoseHistory, PoseRange, Timestamped,
};
use crate::engine::map::{KeyFrame, LocalMapConfig, LocalMapHandle, MapGraph, MapLoader};
use crate::error::{LocateError, Result};
use crate::state::{pose_queue, PoseSender};
use crate::threads::LocalMapThread;

use super::backend::{
    FrameResult, FrameStatus, GlobalLocator, LocalizationBackend, Localizer, TrackingState,
};
use super::failure::{FailureTracker, FailureTrackerConfig};
use super::motion::MotionPredictor;

/// Session configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalizationConfig {
    /// Name of the point-cloud stream used for registration.
    pub lidar_name: String,

    /// Name of the image stream retained for downstream consumers.
    pub image_name: Option<String>,

    /// Sensor streams the caller will provide. `lidar_name` (and
    /// `image_name`, when set) must appear here.
    pub sensors: Vec<String>,

    /// Directory the map graph is loaded from at `init`.
    pub map_directory: PathBuf,

    /// Allowed bounds for seed poses and relocalization searches.
    pub search_bounds: PoseRange,

    /// Floor height used for anomaly-inlier detection (meters).
    pub floor_height: f32,

    /// Squared-distance occlusion cutoff for the per-frame fitness score
    /// (m²).
    pub max_range_sq: f64,

    /// Capacity of the pose queue to the local-map thread.
    pub queue_capacity: usize,

    /// Number of tracked poses retained for timed queries.
    pub pose_history_capacity: usize,

    /// Local map window configuration.
    pub local_map: LocalMapConfig,

    /// Fitness / information estimator configuration.
    pub estimator: InformationEstimatorConfig,

    /// Failure tracking configuration.
    pub failure: FailureTrackerConfig,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            lidar_name: "lidar".into(),
            image_name: None,
            sensors: vec!["lidar".into()],
            map_directory: PathBuf::new(),
            search_bounds: PoseRange::new(-1e4, 1e4, -1e4, 1e4, -100.0, 100.0),
            floor_height: 0.0,
            max_range_sq: 25.0,
            queue_capacity: 8,
            pose_history_capacity: 512,
            local_map: LocalMapConfig::default(),
            estimator: InformationEstimatorConfig::default(),
            failure: FailureTrackerConfig::default(),
        }
    }
}

impl LocalizationConfig {
    /// Validate sensor identifiers and pose-search bounds.
    fn validate(&self) -> Result<()> {
        if self.lidar_name.is_empty() {
            return Err(LocateError::Config("lidar stream name is empty".into()));
        }
        if !self.sensors.iter().any(|s| s == &self.lidar_name) {
            return Err(LocateError::Config(format!(
                "required lidar stream '{}' not among available sensors",
                self.lidar_name
            )));
        }
        if let Some(image) = &self.image_name {
            if !self.sensors.iter().any(|s| s == image) {
                return Err(LocateError::Config(format!(
                    "image stream '{}' not among available sensors",
                    image
                )));
            }
        }
        if !self.search_bounds.validate() {
            return Err(LocateError::Config("invalid pose search bounds".into()));
        }
        if self.max_range_sq < 0.0 {
            return Err(LocateError::Config("max_range_sq must be >= 0".into()));
        }
        Ok(())
    }
}

/// Map-relative localization controller.
pub struct LocalizationController {
    config: Option<LocalizationConfig>,
    state: TrackingState,

    localizer: Box<dyn Localizer>,
    global_locator: Box<dyn GlobalLocator>,
    map_loader: Box<dyn MapLoader>,

    estimator: InformationEstimator,
    /// Local-map generation the estimator's index was last rebuilt from.
    indexed_generation: Option<u64>,

    graph: Arc<RwLock<MapGraph>>,
    local_map: LocalMapHandle,
    no_coverage: Arc<AtomicBool>,
    color_map: Arc<PointCloud3D>,

    pose_tx: Option<PoseSender>,
    map_thread: Option<LocalMapThread>,

    failure: FailureTracker,
    history: PoseHistory,
    motion: MotionPredictor,

    init_pose: Option<Pose>,
    init_range: Option<PoseRange>,

    latest_images: HashMap<String, ImageFrame>,
}

impl LocalizationController {
    /// Create an uninitialized controller over its external capabilities.
    pub fn new(
        localizer: Box<dyn Localizer>,
        global_locator: Box<dyn GlobalLocator>,
        map_loader: Box<dyn MapLoader>,
    ) -> Self {
        Self {
            config: None,
            state: TrackingState::Uninitialized,
            localizer,
            global_locator,
            map_loader,
            estimator: InformationEstimator::default(),
            indexed_generation: None,
            graph: Arc::new(RwLock::new(MapGraph::new())),
            local_map: LocalMapHandle::new(),
            no_coverage: Arc::new(AtomicBool::new(false)),
            color_map: Arc::new(PointCloud3D::new()),
            pose_tx: None,
            map_thread: None,
            failure: FailureTracker::default(),
            history: PoseHistory::new(1),
            motion: MotionPredictor::new(),
            init_pose: None,
            init_range: None,
            latest_images: HashMap::new(),
        }
    }

    /// Current session state.
    pub fn state(&self) -> TrackingState {
        self.state
    }

    /// Whether the local-map window currently has keyframe coverage.
    pub fn local_map_coverage(&self) -> bool {
        !self.no_coverage.load(Ordering::SeqCst)
    }

    /// Stable snapshot of the currently published local map.
    pub fn local_map_snapshot(&self) -> Arc<crate::engine::map::LocalMap> {
        self.local_map.snapshot()
    }

    /// Most recent stored camera frame for a stream, if any.
    pub fn latest_image(&self, name: &str) -> Option<&ImageFrame> {
        self.latest_images.get(name)
    }

    /// Load an additional map directory and union it into the graph.
    ///
    /// Takes the graph write lock, mutually excluding a concurrent
    /// local-map rebuild for the duration of the merge. Returns the merged
    /// keyframes.
    pub fn merge_map(&mut self, directory: &Path) -> Result<Vec<Arc<KeyFrame>>> {
        if self.config.is_none() {
            return Err(LocateError::NotInitialized);
        }
        let frames = self.map_loader.load(directory)?;
        log::info!(
            "merging {} keyframes from {}",
            frames.len(),
            directory.display()
        );
        {
            let mut graph = self.graph.write();
            graph.merge(frames.clone());
            self.color_map = Arc::new(graph.color_map());
        }
        Ok(frames)
    }

    /// Read-only snapshot of the full keyframe graph.
    pub fn get_graph_map(&self) -> Vec<Arc<KeyFrame>> {
        self.graph.read().frames()
    }

    /// Last-published colorized map snapshot.
    pub fn get_color_map(&self) -> Arc<PointCloud3D> {
        self.color_map.clone()
    }

    /// Halt the session. Terminal until [`reset`](Self::reset).
    pub fn fail(&mut self) {
        log::warn!("session halted externally");
        self.state = TrackingState::Failed;
    }

    /// Explicit external reset back to `Initializing`.
    ///
    /// Keeps the loaded map and background thread; drops tracking state so
    /// the session re-seeds like a fresh start.
    pub fn reset(&mut self) -> Result<()> {
        if self.config.is_none() {
            return Err(LocateError::NotInitialized);
        }
        log::info!("session reset to Initializing");
        self.state = TrackingState::Initializing;
        self.failure.reset();
        self.history.clear();
        self.motion.reset();
        self.init_pose = None;
        self.init_range = None;
        self.indexed_generation = None;
        Ok(())
    }

    /// Rebuild the estimator's correspondence index when the local map
    /// snapshot changed since the last frame.
    fn ensure_index(&mut self, snapshot: &crate::engine::map::LocalMap) {
        if self.indexed_generation != Some(snapshot.generation) {
            self.estimator.rebuild_index(&snapshot.cloud);
            self.indexed_generation = Some(snapshot.generation);
        }
    }

    /// Adopt a pose as the new estimate: record history, feed the motion
    /// predictor, and wake the local-map thread.
    fn adopt_pose(&mut self, pose: Timestamped<Pose>) {
        self.history.push(pose.clone());
        self.motion.observe(pose.clone());
        if let Some(tx) = &self.pose_tx {
            tx.send_latest(pose);
        }
    }

    fn frame_result(&self, status: FrameStatus) -> FrameResult {
        FrameResult {
            status,
            state: self.state,
            pose: None,
            fitness: None,
            information: None,
            anomaly_inliers: Vec::new(),
            consecutive_failures: self.failure.consecutive_failures(),
            local_map_coverage: self.local_map_coverage(),
        }
    }

    /// First registration while `Initializing`.
    fn process_initializing(
        &mut self,
        timestamp_us: u64,
        scan: &PointCloud3D,
        floor_height: f32,
        max_range_sq: f64,
    ) -> FrameResult {
        // A seed pose registers against the local map; a range-only seed
        // goes through the global locator's full search.
        if let Some(seed) = self.init_pose {
            let snapshot = self.local_map.snapshot();
            if snapshot.is_empty() {
                // Window not built yet: center it on the seed and retry
                // next frame.
                if let Some(tx) = &self.pose_tx {
                    tx.send_latest(Timestamped::new(seed, timestamp_us));
                }
                return self.frame_result(FrameStatus::NoLocalMapCoverage);
            }

            self.ensure_index(&snapshot);
            let estimate = self.localizer.estimate(&snapshot.cloud, scan, &seed);
            let (fitness, inliers) = self.estimator.fitness_with_inliers(
                &snapshot.cloud,
                scan,
                &estimate.pose,
                floor_height,
                max_range_sq,
            );
            let check = self.failure.check(fitness, estimate.converged);
            if check.failed {
                log::debug!("initial registration rejected (fitness {:.3})", fitness);
                return self.frame_result(FrameStatus::RegistrationFailed);
            }

            log::info!("initial registration accepted, tracking started");
            self.state = TrackingState::Tracking;
            self.failure.reset();
            let pose = Timestamped::new(estimate.pose, timestamp_us);
            self.adopt_pose(pose.clone());
            let information = self.estimator.information_matrix_for_fitness(fitness);
            let mut result = self.frame_result(FrameStatus::Tracked);
            result.pose = Some(pose);
            result.fitness = Some(fitness);
            result.information = Some(information);
            result.anomaly_inliers = inliers;
            return result;
        }

        if let Some(range) = self.init_range {
            return self.attempt_relocalization(timestamp_us, scan, &range);
        }

        self.frame_result(FrameStatus::AwaitingSeed)
    }

    /// One GlobalLocator attempt. Shared by seedless initialization and the
    /// `Relocalizing` fallback.
    fn attempt_relocalization(
        &mut self,
        timestamp_us: u64,
        scan: &PointCloud3D,
        search: &PoseRange,
    ) -> FrameResult {
        match self.global_locator.relocalize(scan, search) {
            Some(pose) => {
                log::info!("relocalization succeeded, reseeding pose");
                self.state = TrackingState::Tracking;
                self.failure.reset();
                self.motion.reset();
                let pose = Timestamped::new(pose, timestamp_us);
                self.adopt_pose(pose.clone());
                let mut result = self.frame_result(FrameStatus::Relocalized);
                result.pose = Some(pose);
                result
            }
            None => {
                log::debug!("relocalization attempt failed, retrying next frame");
                self.frame_result(FrameStatus::RelocalizationFailed)
            }
        }
    }

    /// Per-frame registration while `Tracking` or `Degraded`.
    fn process_tracking(
        &mut self,
        timestamp_us: u64,
        scan: &PointCloud3D,
        floor_height: f32,
        max_range_sq: f64,
    ) -> FrameResult {
        let snapshot = self.local_map.snapshot();
        if snapshot.is_empty() {
            // Keep the window thread fed so coverage can come back.
            if let Some(latest) = self.history.latest() {
                let pose = Timestamped::new(latest.data, timestamp_us);
                if let Some(tx) = &self.pose_tx {
                    tx.send_latest(pose);
                }
            }
            return self.frame_result(FrameStatus::NoLocalMapCoverage);
        }

        let prior = self
            .motion
            .predict(timestamp_us)
            .or_else(|| self.history.latest().map(|p| p.data))
            .unwrap_or_else(Pose::identity);

        self.ensure_index(&snapshot);
        let estimate = self.localizer.estimate(&snapshot.cloud, scan, &prior);
        let (fitness, inliers) = self.estimator.fitness_with_inliers(
            &snapshot.cloud,
            scan,
            &estimate.pose,
            floor_height,
            max_range_sq,
        );

        let check = self.failure.check(fitness, estimate.converged);
        if check.failed {
            self.state = if check.should_relocalize {
                log::warn!(
                    "{} consecutive registration failures, falling back to relocalization",
                    check.consecutive_failures
                );
                TrackingState::Relocalizing
            } else {
                log::debug!(
                    "registration failed (fitness {:.3}, streak {})",
                    fitness,
                    check.consecutive_failures
                );
                TrackingState::Degraded
            };
            let mut result = self.frame_result(FrameStatus::RegistrationFailed);
            result.fitness = Some(fitness);
            return result;
        }

        self.state = TrackingState::Tracking;
        let pose = Timestamped::new(estimate.pose, timestamp_us);
        self.adopt_pose(pose.clone());
        let information = self.estimator.information_matrix_for_fitness(fitness);

        let mut result = self.frame_result(FrameStatus::Tracked);
        result.pose = Some(pose);
        result.fitness = Some(fitness);
        result.information = Some(information);
        result.anomaly_inliers = inliers;
        result
    }
}

impl LocalizationBackend for LocalizationController {
    type Config = LocalizationConfig;

    /// Initialize the session: validate configuration, load the map, and
    /// start the local-map window thread.
    fn init(&mut self, config: LocalizationConfig) -> Result<()> {
        if self.config.is_some() {
            return Err(LocateError::Config("already initialized".into()));
        }
        config.validate()?;

        let frames = self.map_loader.load(&config.map_directory)?;
        if frames.is_empty() {
            return Err(LocateError::MapLoad(format!(
                "no keyframes in {}",
                config.map_directory.display()
            )));
        }
        log::info!("loaded map graph with {} keyframes", frames.len());

        {
            let mut graph = self.graph.write();
            *graph = MapGraph::from_frames(frames);
            self.color_map = Arc::new(graph.color_map());
        }

        let (tx, rx) = pose_queue(config.queue_capacity);
        self.map_thread = Some(LocalMapThread::spawn(
            config.local_map,
            self.graph.clone(),
            self.local_map.clone(),
            rx,
            self.no_coverage.clone(),
        ));
        self.pose_tx = Some(tx);

        self.estimator = InformationEstimator::new(config.estimator);
        self.failure = FailureTracker::new(config.failure);
        self.history = PoseHistory::new(config.pose_history_capacity);
        self.state = TrackingState::Initializing;
        self.config = Some(config);
        Ok(())
    }

    fn is_inited(&self) -> bool {
        self.config.is_some()
    }

    fn set_init_pose(&mut self, pose: Pose) -> Result<()> {
        let config = self.config.as_ref().ok_or(LocateError::NotInitialized)?;
        if !config.search_bounds.contains(&pose) {
            return Err(LocateError::Config(
                "seed pose outside configured search bounds".into(),
            ));
        }
        self.init_pose = Some(pose);
        if self.state != TrackingState::Failed {
            self.state = TrackingState::Initializing;
            self.failure.reset();
            self.motion.reset();
        }
        Ok(())
    }

    fn set_init_pose_range(&mut self, range: PoseRange) -> Result<()> {
        if self.config.is_none() {
            return Err(LocateError::NotInitialized);
        }
        if !range.validate() {
            return Err(LocateError::Config("invalid init pose range".into()));
        }
        self.init_range = Some(range);
        Ok(())
    }

    fn feed_ins_data(&mut self, fix: InsFix) {
        self.motion.feed_ins(fix);
    }

    fn feed_imu_data(&mut self, imu: ImuSample) {
        self.motion.feed_imu(imu);
    }

    fn feed_image_data(&mut self, _timestamp_us: u64, images: &HashMap<String, ImageFrame>) {
        let Some(config) = self.config.as_ref() else {
            return;
        };
        if let Some(name) = &config.image_name {
            if let Some(frame) = images.get(name) {
                self.latest_images.insert(name.clone(), frame.clone());
            }
        }
    }

    fn feed_point_data(
        &mut self,
        timestamp_us: u64,
        clouds: &HashMap<String, Arc<PointCloud3D>>,
    ) -> Result<FrameResult> {
        let config = self.config.as_ref().ok_or(LocateError::NotInitialized)?;
        let lidar_name = config.lidar_name.clone();
        let floor_height = config.floor_height;
        let max_range_sq = config.max_range_sq;
        let search_bounds = config.search_bounds;
        let scan = clouds
            .get(&lidar_name)
            .ok_or(LocateError::MissingSensor(lidar_name))?
            .clone();

        match self.state {
            TrackingState::Uninitialized => Err(LocateError::NotInitialized),
            TrackingState::Failed => Err(LocateError::Halted),
            TrackingState::Initializing => {
                Ok(self.process_initializing(timestamp_us, &scan, floor_height, max_range_sq))
            }
            TrackingState::Tracking | TrackingState::Degraded => {
                Ok(self.process_tracking(timestamp_us, &scan, floor_height, max_range_sq))
            }
            TrackingState::Relocalizing => {
                let search = self.init_range.unwrap_or(search_bounds);
                Ok(self.attempt_relocalization(timestamp_us, &scan, &search))
            }
        }
    }

    fn get_pose(&self) -> Result<Timestamped<Pose>> {
        match self.state {
            TrackingState::Relocalizing
            | TrackingState::Failed
            | TrackingState::Uninitialized => Err(LocateError::NoPose),
            _ => self.history.latest().cloned().ok_or(LocateError::NoPose),
        }
    }

    fn get_timed_pose(&self, timestamp_us: u64) -> Result<Pose> {
        self.history.pose_at(timestamp_us)
    }

    fn get_timed_pose_ins(&self, fix: &InsFix) -> Result<Pose> {
        self.history.pose_at(fix.timestamp_us)
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.map_thread.take() {
            log::info!("stopping local map thread");
            thread.stop();
        }
        self.pose_tx = None;
        if self.config.take().is_some() {
            self.state = TrackingState::Uninitialized;
        }
    }
}

impl Drop for LocalizationController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
