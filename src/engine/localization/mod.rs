//! Localization session: controller, failure tracking, and capability seams.
//!
//! # Components
//!
//! - [`LocalizationController`]: the orchestrating state machine
//! - [`FailureTracker`]: consecutive registration-failure counting
//! - [`MotionPredictor`]: INS/IMU motion prior for the registration seed
//! - [`Localizer`] / [`GlobalLocator`]: external scan matching and
//!   relocalization capabilities
//! - [`LocalizationBackend`]: the session capability surface

mod backend;
mod controller;
mod failure;
mod motion;

pub use backend::{
    FrameResult, FrameStatus, GlobalLocator, LocalizationBackend, Localizer, LocalizerEstimate,
    TrackingState,
};
pub use controller::{LocalizationConfig, LocalizationController};
pub use failure::{FailureTracker, FailureTrackerConfig, RegistrationCheck};
pub use motion::MotionPredictor;
