//! Spatial search over mesh blocks.

pub mod kd_tree;

pub use kd_tree::{DEFAULT_LEAF_CAPACITY, KdTree};
