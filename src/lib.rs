//! srclink - source-linked IDE projects for a binary plugin distribution
//!
//! For every deployed bundle this crate derives the dependency graph from
//! its manifest, traces every deployed file back to the source directory
//! that produced it, and writes an IDE project with linked source folders,
//! partitioned outputs and include/exclude filters.

pub mod catalog;
pub mod core;
pub mod emit;
pub mod graph;
pub mod ops;
pub mod reconcile;
pub mod sources;
pub mod util;

pub use core::{Bundle, BundleSet, BundleVersion, Workspace};
pub use graph::DependencyGraph;
pub use ops::{synthesize, Report, SynthesizeOptions};
pub use sources::BundleIndex;
pub use util::context::GlobalContext;
