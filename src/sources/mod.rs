//! Bundle sources.
//!
//! Sources provide the deployed bundles the synthesizer works on.

pub mod index;
pub mod plugins;

pub use index::BundleIndex;
pub use plugins::PluginDirIndex;
