//! Pipeline orchestration: wiring the stages together and persisting
//! the run artifact.

pub mod artifact;
pub mod tracker;

pub use tracker::EmissionsTracker;
