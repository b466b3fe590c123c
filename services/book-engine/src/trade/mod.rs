//! Trade application mechanics
//!
//! Builds per-side fill plans for externally observed trade prints.

pub mod plan;

pub use plan::{Fill, FillPlan};
