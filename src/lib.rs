//! Access-pattern analysis and rule engine for HPC I/O traces.
//!
//! The pipeline ingests normalized per-operation or per-counter I/O tables,
//! derives access-pattern statistics, and evaluates them against a
//! configurable threshold policy to produce structured findings.

pub mod analysis;
pub mod config;
pub mod error;
pub mod input;
pub mod normalize;
pub mod record;
pub mod rules;
pub mod thresholds;

pub use analysis::{run, AnalysisOptions, AnalysisReport};
pub use error::AnalysisError;
pub use normalize::{normalize, NormalizedTrace};
pub use thresholds::{ThresholdId, ThresholdPolicy};
