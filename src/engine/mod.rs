//! Orchestration layer: map management and the localization session.

pub mod localization;
pub mod map;
