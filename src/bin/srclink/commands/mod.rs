//! Command implementations

pub mod synthesize;
