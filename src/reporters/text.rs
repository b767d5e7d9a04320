//! Text (terminal) reporter with colors and formatting

use crate::models::Status;
use crate::snapshot::ReportSnapshot;
use anyhow::Result;

/// Grade colors (ANSI escape codes)
fn grade_color(grade: &str) -> &'static str {
    match grade {
        "A" => "\x1b[32m", // Green
        "B" => "\x1b[92m", // Light green
        "C" => "\x1b[33m", // Yellow
        "D" => "\x1b[91m", // Light red
        "F" => "\x1b[31m", // Red
        _ => "\x1b[0m",
    }
}

/// Status colors
fn status_color(status: Status) -> &'static str {
    match status {
        Status::Low => "\x1b[34m",     // Blue
        Status::Optimal => "\x1b[32m", // Green
        Status::High => "\x1b[91m",    // Light red
    }
}

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

/// Render a snapshot as formatted terminal output
pub fn render(snapshot: &ReportSnapshot) -> Result<String> {
    let mut out = String::new();
    let score = snapshot.score();
    let grade_c = grade_color(&score.grade);

    out.push_str(&format!("\n{BOLD}Strandlab Interpretation{RESET}\n"));
    out.push_str(&format!(
        "{DIM}──────────────────────────────────────{RESET}\n"
    ));
    out.push_str(&format!(
        "Score: {BOLD}{:.1}/100{RESET}  Grade: {grade_c}{BOLD}{}{RESET}  {DIM}{}{RESET}\n",
        score.total, score.grade, score.grade_interpretation
    ));
    out.push_str(&format!(
        "{DIM}Range version {} · engine {} · semantics {}{RESET}\n\n",
        snapshot.meta().range_version_id,
        snapshot.meta().engine_version,
        snapshot.meta().semantics_version
    ));

    out.push_str(&format!("{BOLD}SUB-SCORES{RESET}\n"));
    out.push_str(&format!(
        "  Minerals: {:.1}/60  Ratios: {:.1}/30  Red flags: {:.1}/10\n\n",
        score.mineral_score, score.ratio_score, score.red_flag_score
    ));

    let classification = snapshot.classification();
    out.push_str(&format!(
        "{BOLD}OXIDATION PATTERN{RESET}  {} ({} confidence)\n",
        classification.archetype, classification.confidence
    ));
    out.push_str(&format!("  {DIM}{}{RESET}\n", classification.explanation));
    for warning in &classification.warnings {
        out.push_str(&format!("  {DIM}! {warning}{RESET}\n"));
    }
    out.push('\n');

    out.push_str(&format!("{BOLD}MARKERS{RESET}\n"));
    for measurement in snapshot.minerals() {
        if !measurement.status.is_abnormal() {
            continue;
        }
        let color = status_color(measurement.status);
        out.push_str(&format!(
            "  {color}{:<8}{RESET} {} {} {DIM}(ideal {}-{}){RESET}\n",
            format!("[{}]", measurement.status),
            measurement.symbol,
            measurement.value,
            measurement.range.min,
            measurement.range.max
        ));
    }
    for ratio in snapshot.ratios() {
        if !ratio.status.is_abnormal() {
            continue;
        }
        let color = status_color(ratio.status);
        out.push_str(&format!(
            "  {color}{:<8}{RESET} {} {:.2} {DIM}(ideal {}-{}){RESET}\n",
            format!("[{}]", ratio.status),
            ratio.key(),
            ratio.value,
            ratio.range.min,
            ratio.range.max
        ));
    }
    let abnormal = snapshot
        .minerals()
        .iter()
        .map(|m| m.status)
        .chain(snapshot.ratios().iter().map(|r| r.status))
        .filter(|s| s.is_abnormal())
        .count();
    if abnormal == 0 {
        out.push_str("  all markers within ideal bands\n");
    }
    out.push('\n');

    if let Some(delta) = snapshot.delta() {
        out.push_str(&format!("{BOLD}CHANGE{RESET}  {}\n", delta.headline));
        out.push_str(&format!("  {DIM}{}{RESET}\n", delta.summary));
        for driver in &delta.top_drivers {
            out.push_str(&format!(
                "  {:+.1}  {} {DIM}({}){RESET}\n",
                driver.impact, driver.key, driver.note
            ));
        }
        out.push('\n');
    }

    let guardrails = snapshot.guardrails();
    if !guardrails.insights.is_empty() {
        out.push_str(&format!("{BOLD}INSIGHTS{RESET}\n"));
        for insight in &guardrails.insights {
            out.push_str(&format!("  • {insight}\n"));
        }
        out.push('\n');
    }
    out.push_str(&format!("{BOLD}RECOMMENDATIONS{RESET}\n"));
    for recommendation in &guardrails.recommendations {
        out.push_str(&format!("  • {recommendation}\n"));
    }
    if guardrails.removed_count > 0 {
        out.push_str(&format!(
            "\n{DIM}{} narrative item(s) withheld by the content policy{RESET}\n",
            guardrails.removed_count
        ));
    }

    Ok(out)
}
