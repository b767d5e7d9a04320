//! CLI command definitions and handlers

pub(crate) mod analyze;
mod delta;
mod versions;

use crate::registry::{load_version_file, ReferenceRangeRegistry};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Strandlab - deterministic HTMA interpretation
///
/// 100% LOCAL - measurements never leave your machine.
#[derive(Parser, Debug)]
#[command(name = "strandlab")]
#[command(
    version,
    about = "Interpret hair-tissue mineral panels: versioned range classification, composite scoring, oxidation typing, safety-gated narrative",
    after_help = "\
Examples:
  strandlab analyze panel.json                      Interpret a panel (terminal output)
  strandlab analyze panel.json --format json        JSON snapshot for scripting
  strandlab analyze panel.json --format md -o report.md   Export a document
  strandlab analyze panel.json --prior last.json    Explain the change since a prior panel
  strandlab delta last.json panel.json              Delta explanation only
  strandlab versions list                           Show reference-range versions
  strandlab versions compare 2.1.0 2.2.0 --load rev.toml  Compare against a curated revision

Input file format (JSON):
  { \"values\": {\"Ca\": 50.0, \"Mg\": 6.0, ...},
    \"present\": [\"Ca\", \"Mg\", ...],
    \"insights\": [\"...\"], \"recommendations\": [\"...\"] }"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Curated range-version TOML files to load into the registry
    #[arg(long, global = true)]
    pub load: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interpret a mineral panel into a full report snapshot
    Analyze {
        /// Panel input file (JSON)
        input: PathBuf,

        /// Output format: text, json, markdown (or md)
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json", "markdown", "md"])]
        format: String,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Prior panel file for a score-delta explanation
        #[arg(long)]
        prior: Option<PathBuf>,

        /// Narrative audience
        #[arg(long, default_value = "consumer", value_parser = ["consumer", "practitioner"])]
        audience: String,

        /// Pin a specific range version instead of the active one
        #[arg(long)]
        pin_version: Option<String>,
    },

    /// Explain the score change between two panels
    Delta {
        /// Prior panel file (JSON)
        prior: PathBuf,
        /// Current panel file (JSON)
        current: PathBuf,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Inspect and compare reference-range versions
    Versions {
        #[command(subcommand)]
        action: VersionsAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum VersionsAction {
    /// List registered versions
    List,
    /// Compare two versions symbol by symbol
    Compare {
        from: String,
        to: String,
    },
    /// Advise whether a panel should migrate between versions
    Migrate {
        from: String,
        to: String,
        /// Panel input file (JSON) whose values drive the advice
        input: PathBuf,
    },
}

/// Build the registry: built-in version plus any curated files.
fn build_registry(load: &[PathBuf]) -> Result<ReferenceRangeRegistry> {
    let registry = ReferenceRangeRegistry::with_builtin();
    for path in load {
        let params = load_version_file(path)
            .with_context(|| format!("loading version file {}", path.display()))?;
        registry
            .create_version(params)
            .with_context(|| format!("registering version from {}", path.display()))?;
    }
    Ok(registry)
}

/// Dispatch a parsed CLI invocation.
pub fn run(cli: Cli) -> Result<()> {
    let registry = build_registry(&cli.load)?;
    match cli.command {
        Commands::Analyze {
            input,
            format,
            output,
            prior,
            audience,
            pin_version,
        } => analyze::run(
            &registry,
            &input,
            &format,
            output.as_deref(),
            prior.as_deref(),
            &audience,
            pin_version,
        ),
        Commands::Delta {
            prior,
            current,
            format,
        } => delta::run(&registry, &prior, &current, &format),
        Commands::Versions { action } => versions::run(&registry, action),
    }
}
