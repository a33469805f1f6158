//! Sensor input types fed into the localization controller.
//!
//! Parsing and driver protocols are out of scope; these are the already
//! decoded frames the caller pushes in.

use serde::{Deserialize, Serialize};

/// INS/RTK fix quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsStatus {
    /// No usable solution.
    Invalid,
    /// Single-point or float solution.
    Float,
    /// RTK fixed solution.
    Fixed,
}

/// A timestamped INS/GNSS fix, already projected into the map frame.
///
/// Geodetic/UTM projection happens upstream; the controller only consumes
/// map-frame coordinates as a motion prior and as a timed-pose query key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InsFix {
    /// Timestamp in microseconds since epoch
    pub timestamp_us: u64,
    /// X position in the map frame, meters
    pub x: f64,
    /// Y position in the map frame, meters
    pub y: f64,
    /// Z position in the map frame, meters
    pub z: f64,
    /// Heading in radians
    pub yaw: f64,
    /// Fix quality
    pub status: InsStatus,
}

/// A single IMU sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    /// Timestamp in microseconds since epoch
    pub timestamp_us: u64,
    /// Angular velocity around x, y, z (rad/s)
    pub gyro: [f64; 3],
    /// Linear acceleration along x, y, z (m/s²)
    pub accel: [f64; 3],
}

/// An opaque camera frame associated with a sensor cycle.
///
/// Stored for downstream consumers (e.g. map colorization); never decoded
/// here.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFrame {
    /// Timestamp in microseconds since epoch
    pub timestamp_us: u64,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Encoded image bytes
    pub data: Vec<u8>,
}
