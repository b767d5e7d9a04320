//! JSON reporter
//!
//! Outputs the full snapshot as pretty-printed JSON for machine
//! consumption. The snapshot's own serialization is the wire format; the
//! version stamps it carries are part of the payload, since a stored
//! snapshot is only meaningful together with them.

use crate::snapshot::ReportSnapshot;
use anyhow::Result;

/// Render a snapshot as JSON
pub fn render(snapshot: &ReportSnapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Render a snapshot as compact JSON (single line)
pub fn render_compact(snapshot: &ReportSnapshot) -> Result<String> {
    Ok(serde_json::to_string(snapshot)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_snapshot;

    #[test]
    fn test_json_render_valid() {
        let snapshot = test_snapshot();
        let json_str = render(&snapshot).expect("render JSON");
        let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("parse JSON");
        assert_eq!(parsed["meta"]["range_version_id"], "2.1.0");
        assert!(parsed["score"]["total"].is_number());
        assert!(parsed["meta"]["engine_version"].is_string());
        assert!(parsed["meta"]["semantics_version"].is_string());
    }

    #[test]
    fn test_json_render_compact() {
        let snapshot = test_snapshot();
        let json_str = render_compact(&snapshot).expect("render compact JSON");
        assert!(!json_str.contains('\n'));
        let _: serde_json::Value = serde_json::from_str(&json_str).expect("parse compact JSON");
    }
}
