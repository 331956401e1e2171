//! High-level operations.
//!
//! This module contains the synthesizer run and its report.

pub mod report;
pub mod synthesize;

pub use report::{BundleSummary, Report, UnusedRoot};
pub use synthesize::{synthesize, synthesize_index, SynthesizeOptions};
