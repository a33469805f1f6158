//! Foundation layer: data types shared by every other module.

pub mod types;
