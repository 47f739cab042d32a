// haven/flow/src/branch/mod.rs

//! Branch points: a step that picks one of several sub-flows based on the
//! parent context and runs it on an extracted sub-context.

pub mod arm;
pub mod builder;

pub use builder::{ArmBuilder, BranchBuilder};
