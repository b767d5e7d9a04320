//! Strandlab - deterministic HTMA interpretation CLI
//!
//! Classifies a mineral panel against versioned reference ranges and
//! produces a scored, pattern-labeled, safety-gated report snapshot.

use anyhow::Result;
use clap::Parser;
use strandlab::cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Parse CLI args and run
    let cli = cli::Cli::parse();
    cli::run(cli)
}
