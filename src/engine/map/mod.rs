//! Map graph, keyframes, and the rolling local map window.

pub mod graph;
pub mod keyframe;
pub mod local_map;

pub use graph::MapGraph;
pub use keyframe::{KeyFrame, MapLoader};
pub use local_map::{build_local_map, LocalMap, LocalMapConfig, LocalMapHandle};
