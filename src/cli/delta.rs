//! `delta` command: explain the score change between two panel files

use crate::cli::analyze::read_panel;
use crate::config::Semantics;
use crate::delta::{explain_score_delta, state_from_panel};
use crate::registry::ReferenceRangeRegistry;
use anyhow::Result;
use std::path::Path;

pub(crate) fn run(
    registry: &ReferenceRangeRegistry,
    prior: &Path,
    current: &Path,
    format: &str,
) -> Result<()> {
    let semantics = Semantics::load()?;
    let version = registry.active_version()?;
    let prior_state = state_from_panel(&read_panel(prior)?.values, &version.table, semantics);
    let current_state = state_from_panel(&read_panel(current)?.values, &version.table, semantics);
    let explanation = explain_score_delta(&prior_state, &current_state, &version.table, semantics);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&explanation)?);
        return Ok(());
    }

    println!("{}", explanation.headline);
    println!("{}", explanation.summary);
    for driver in &explanation.top_drivers {
        println!("  {:+.1}  {}  ({})", driver.impact, driver.key, driver.note);
    }
    Ok(())
}
