//! Core algorithms: spatial search and registration confidence estimation.

pub mod fitness;
pub mod spatial;

pub use fitness::{AnomalyInliers, InformationEstimator, InformationEstimatorConfig};
pub use spatial::{CloudIndex, KeyframeIndex, Neighbor};
