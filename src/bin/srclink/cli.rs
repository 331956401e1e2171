//! CLI definitions using clap.

use clap::Parser;

/// srclink - source-linked IDE projects for a binary plugin distribution
///
/// Reads `libraries/` and the plugin folder, writes one project per bundle
/// under `projects/` and prints a report.
#[derive(Parser)]
#[command(name = "srclink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not draw a progress bar
    #[arg(long)]
    pub no_progress: bool,
}
