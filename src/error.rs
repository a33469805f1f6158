//! Error types for DhruvaLocate.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, LocateError>;

/// DhruvaLocate error type.
///
/// Only `Config` is fatal to a session; everything else leaves the
/// controller live. Recoverable per-frame conditions (registration failure,
/// lost local-map coverage, failed relocalization) are reported through
/// [`FrameStatus`](crate::engine::localization::FrameStatus) rather than as
/// errors, so that a single bad frame never tears down the pipeline.
#[derive(Error, Debug)]
pub enum LocateError {
    /// Invalid initialization parameters. Fatal to `init`.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An operation that requires a running session was called before `init`.
    #[error("Controller not initialized")]
    NotInitialized,

    /// Map loading / merge I/O failure.
    #[error("Map load failed: {0}")]
    MapLoad(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A named sensor stream required by the configuration was missing
    /// from a sensor frame.
    #[error("Sensor stream not found: {0}")]
    MissingSensor(String),

    /// A timed-pose query fell outside the retained pose history.
    #[error("Pose query out of range: requested {requested_us} us, history spans [{oldest_us}, {newest_us}] us")]
    QueryOutOfRange {
        /// Requested timestamp in microseconds
        requested_us: u64,
        /// Oldest retained timestamp
        oldest_us: u64,
        /// Newest retained timestamp
        newest_us: u64,
    },

    /// No pose estimate is available (never tracked, or currently
    /// relocalizing with no estimate).
    #[error("No pose available")]
    NoPose,

    /// The session was halted externally and requires an explicit reset.
    #[error("Session halted")]
    Halted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LocateError::Config("lidar name empty".into());
        assert_eq!(err.to_string(), "Configuration error: lidar name empty");

        let err = LocateError::QueryOutOfRange {
            requested_us: 5,
            oldest_us: 10,
            newest_us: 20,
        };
        assert!(err.to_string().contains("requested 5 us"));
    }
}
