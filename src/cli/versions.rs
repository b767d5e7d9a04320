//! `versions` command: list, compare, and migration advice

use crate::cli::analyze::read_panel;
use crate::cli::VersionsAction;
use crate::registry::ReferenceRangeRegistry;
use anyhow::Result;
use console::style;

pub(crate) fn run(registry: &ReferenceRangeRegistry, action: VersionsAction) -> Result<()> {
    match action {
        VersionsAction::List => {
            for id in registry.version_ids() {
                let version = registry.get(&id)?;
                let label = if version.active {
                    style(format!("* {id}")).green().bold()
                } else {
                    style(format!("  {id}"))
                };
                println!(
                    "{label}  {}  ({}, effective {})",
                    version.name,
                    version.standard,
                    version.effective_at.format("%Y-%m-%d")
                );
                for change in &version.changes {
                    println!("      {} {}", change.symbol, change.category);
                }
            }
        }
        VersionsAction::Compare { from, to } => {
            let comparison = registry.compare_versions(&from, &to)?;
            println!(
                "{} -> {}: {} changed symbol(s)",
                comparison.from_id, comparison.to_id, comparison.total_changes
            );
            for change in comparison.changes.iter().filter(|c| c.changed) {
                let describe = |range: &Option<crate::models::IdealRange>| match range {
                    Some(range) => format!("{}-{}", range.min, range.max),
                    None => "absent".to_string(),
                };
                println!(
                    "  {:<6} {:<8} {} -> {}",
                    change.symbol,
                    change.impact.to_string(),
                    describe(&change.old),
                    describe(&change.new)
                );
            }
        }
        VersionsAction::Migrate { from, to, input } => {
            let panel = read_panel(&input)?;
            let advice = registry.should_migrate_analysis(&from, &to, &panel.values)?;
            if advice.recommended {
                println!(
                    "migration recommended ({:?} severity): {}/{} value(s) change status",
                    advice.severity,
                    advice.flipped_symbols.len(),
                    advice.evaluated
                );
                for symbol in &advice.flipped_symbols {
                    println!("  {symbol}");
                }
            } else {
                println!("migration not recommended");
            }
        }
    }
    Ok(())
}
