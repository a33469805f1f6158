//! DhruvaLocate - Map-relative LiDAR localization engine
//!
//! Real-time 6-DOF pose tracking against a prebuilt keyframe map: per-frame
//! scan-to-map registration through an external matcher, registration
//! confidence scored as a 6×6 information matrix, a rolling local submap
//! maintained off the hot path, and global relocalization fallback when
//! tracking degrades.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    threads/                         │  ← Background work
//! │               (local map window)                    │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Orchestration
//! │        (localization controller, map graph)         │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                  algorithms/                        │  ← Core algorithms
//! │        (fitness estimation, spatial search)         │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                    (types)                          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Data Flow
//!
//! Sensor frame → [`LocalizationController`] → external [`Localizer`]
//! against the current local map → pose estimate scored by
//! [`InformationEstimator`] → information matrix + anomaly flags → pose
//! queue → local map thread (async rebuild) → refreshed local map for the
//! next cycle. On a sustained failure streak the controller falls back to
//! the external [`GlobalLocator`] and reseeds.
//!
//! # Concurrency
//!
//! Exactly two units of execution: the caller's sensor-feed thread driving
//! the controller, and the local map window thread. The local map is shared
//! by atomic handle swap: registration always reads a stable snapshot and
//! never blocks on a rebuild in progress.

// ============================================================================
// Layer 1: Core foundation (no internal deps)
// ============================================================================
pub mod core;

// ============================================================================
// Layer 2: Algorithms (depends on core)
// ============================================================================
pub mod algorithms;

// ============================================================================
// Layer 3: Engine (depends on core, algorithms)
// ============================================================================
pub mod engine;

// ============================================================================
// Layer 4: Shared state and background threads
// ============================================================================
pub mod state;
pub mod threads;

pub mod error;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

// Core types
pub use crate::core::types::{ImageFrame, ImuSample, InsFix, InsStatus};
pub use crate::core::types::{PointCloud3D, Pose, PoseHistory, PoseRange, Timestamped};

// Algorithms
pub use algorithms::{
    AnomalyInliers, CloudIndex, InformationEstimator, InformationEstimatorConfig, KeyframeIndex,
};

// Engine - Map
pub use engine::map::{KeyFrame, LocalMap, LocalMapConfig, LocalMapHandle, MapGraph, MapLoader};

// Engine - Localization
pub use engine::localization::{
    FailureTracker, FailureTrackerConfig, FrameResult, FrameStatus, GlobalLocator,
    LocalizationBackend, LocalizationConfig, LocalizationController, Localizer, LocalizerEstimate,
    MotionPredictor, TrackingState,
};

// Errors
pub use error::{LocateError, Result};
