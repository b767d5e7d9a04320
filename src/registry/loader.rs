//! Curator authoring support: TOML range-version files
//!
//! A curated version is authored as a TOML document and loaded into the
//! registry through the same validation path as programmatic creation.
//!
//! # File format
//!
//! ```toml
//! id = "2.2.0"
//! name = "Autumn 2026 revision"
//! standard = "TEI-2019"
//! supersedes = "2.1.0"
//! rationale = "calcium max revised per updated population data"
//!
//! [minerals.Ca]
//! min = 35.0
//! max = 47.0
//! unit = "mg%"
//!
//! [ratios."Ca/Mg"]
//! min = 6.0
//! max = 10.0
//! ```

use crate::registry::ranges::RangeTable;
use crate::registry::{RegistryError, VersionParams};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::models::IdealRange;

/// On-disk representation of a curated version
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VersionFile {
    id: String,
    name: String,
    standard: String,
    #[serde(default)]
    supersedes: Option<String>,
    #[serde(default)]
    effective_at: Option<DateTime<Utc>>,
    #[serde(default)]
    rationale: String,
    minerals: BTreeMap<String, IdealRange>,
    #[serde(default)]
    ratios: BTreeMap<String, IdealRange>,
}

/// Load a curated version file into creation parameters.
///
/// Bounds validation happens in `ReferenceRangeRegistry::create_version`,
/// so a malformed table fails there with the same errors as programmatic
/// authoring.
pub fn load_version_file(path: &Path) -> Result<VersionParams, RegistryError> {
    let content = std::fs::read_to_string(path)?;
    let file: VersionFile = toml::from_str(&content)?;
    debug!(path = %path.display(), id = %file.id, "loaded curated version file");
    Ok(VersionParams {
        id: file.id,
        name: file.name,
        standard: file.standard,
        effective_at: file.effective_at,
        supersedes: file.supersedes,
        table: RangeTable {
            minerals: file.minerals,
            ratios: file.ratios,
        },
        rationale: file.rationale,
    })
}

/// Write creation parameters back out as a curated version file.
pub fn save_version_file(path: &Path, params: &VersionParams) -> Result<(), RegistryError> {
    let file = VersionFile {
        id: params.id.clone(),
        name: params.name.clone(),
        standard: params.standard.clone(),
        supersedes: params.supersedes.clone(),
        effective_at: params.effective_at,
        rationale: params.rationale.clone(),
        minerals: params.table.minerals.clone(),
        ratios: params.table.ratios.clone(),
    };
    let content = toml::to_string_pretty(&file)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{builtin_table, ReferenceRangeRegistry};

    #[test]
    fn test_version_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("version.toml");

        let mut table = builtin_table();
        table.minerals.get_mut("Ca").expect("Ca").max = 47.0;
        let params = VersionParams {
            id: "2.2.0".to_string(),
            name: "Autumn revision".to_string(),
            standard: "TEI-2019".to_string(),
            effective_at: None,
            supersedes: Some("2.1.0".to_string()),
            table,
            rationale: "calcium max revised".to_string(),
        };

        save_version_file(&path, &params).expect("save");
        let loaded = load_version_file(&path).expect("load");
        assert_eq!(loaded.id, params.id);
        assert_eq!(loaded.supersedes, params.supersedes);
        assert_eq!(loaded.table, params.table);

        let registry = ReferenceRangeRegistry::with_builtin();
        registry.create_version(loaded).expect("create from file");
        let version = registry.get("2.2.0").expect("version");
        assert_eq!(version.changes.len(), 1);
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "id = 42\n").expect("write");
        assert!(matches!(
            load_version_file(&path),
            Err(RegistryError::Parse(_))
        ));
    }
}
