//! srclink CLI - source-linked IDE projects for a binary plugin distribution

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use miette::Diagnostic as _;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::Cli;
use srclink::util::SynthError;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        if let Some(fatal) = e.downcast_ref::<SynthError>() {
            if let Some(code) = fatal.code() {
                eprintln!("  code: {}", code);
            }
            let color = std::io::stderr().is_terminal();
            eprintln!("{}", fatal.to_diagnostic().format(color));
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("srclink=debug")
    } else {
        EnvFilter::new("srclink=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    commands::synthesize::execute(cli)
}
