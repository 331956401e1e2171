//! Core data structures for srclink.
//!
//! This module contains the foundational types used throughout srclink:
//! - Bundle versions and ranges
//! - Bundle manifests and their dependency headers
//! - Selected bundles
//! - The workspace layout

pub mod bundle;
pub mod manifest;
pub mod version;
pub mod workspace;

pub use bundle::{Bundle, BundleSet};
pub use manifest::Attributes;
pub use version::{BundleVersion, VersionRange};
pub use workspace::Workspace;
