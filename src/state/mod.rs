//! Shared state and channels between the controller and background work.

mod pose_queue;

pub use pose_queue::{pose_queue, PoseReceiver, PoseSender};
