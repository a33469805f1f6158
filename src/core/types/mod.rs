//! Core data types for map-relative localization.
//!
//! - [`Pose`]: rigid 3D transform (rotation + translation)
//! - [`PoseRange`]: allowed initial-pose search bounds
//! - [`PointCloud3D`]: 3D point cloud with optional channels
//! - [`Timestamped<T>`]: generic timestamp wrapper
//! - [`PoseHistory`]: retained poses with timed queries
//! - [`InsFix`], [`ImuSample`], [`ImageFrame`]: decoded sensor inputs

mod cloud;
pub mod pose;
mod pose_history;
mod sensor;
mod timestamped;

pub use cloud::PointCloud3D;
pub use pose::{Pose, PoseRange};
pub use pose_history::PoseHistory;
pub use sensor::{ImageFrame, ImuSample, InsFix, InsStatus};
pub use timestamped::Timestamped;
