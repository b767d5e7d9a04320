//! Range tables: symbol -> ideal band mappings
//!
//! A `RangeTable` is the immutable payload of one reference-range version.
//! The built-in table is the v2.1.0 laboratory standard the engine ships
//! with; curated replacements load through `registry::loader`.

use crate::models::{ratio_key, IdealRange, PANEL_MINERALS, PANEL_RATIOS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable symbol -> ideal-range mapping for one version
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeTable {
    /// Mineral symbol -> ideal band
    pub minerals: BTreeMap<String, IdealRange>,
    /// Ratio key ("Ca/Mg") -> ideal band
    pub ratios: BTreeMap<String, IdealRange>,
}

impl RangeTable {
    pub fn mineral(&self, symbol: &str) -> Option<&IdealRange> {
        self.minerals.get(symbol)
    }

    pub fn ratio(&self, key: &str) -> Option<&IdealRange> {
        self.ratios.get(key)
    }

    /// All symbols (minerals then ratios) in deterministic order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.minerals
            .keys()
            .chain(self.ratios.keys())
            .map(String::as_str)
    }

    /// Range for any symbol, mineral or ratio.
    pub fn get(&self, symbol: &str) -> Option<&IdealRange> {
        self.mineral(symbol).or_else(|| self.ratio(symbol))
    }
}

/// The built-in v2.1.0 reference table (mg% for minerals).
pub fn builtin_table() -> RangeTable {
    let mineral_bands: [(&str, f64, f64); 15] = [
        ("Ca", 35.0, 45.0),
        ("Mg", 4.0, 8.0),
        ("Na", 20.0, 30.0),
        ("K", 8.0, 12.0),
        ("Cu", 1.5, 3.5),
        ("Zn", 15.0, 25.0),
        ("P", 12.0, 20.0),
        ("Fe", 1.5, 3.0),
        ("Mn", 0.3, 0.65),
        ("Cr", 0.35, 0.75),
        ("Se", 0.8, 1.6),
        ("B", 0.4, 1.2),
        ("Co", 0.01, 0.04),
        ("Mo", 0.02, 0.08),
        ("S", 3800.0, 5000.0),
    ];
    let ratio_bands: [(&str, &str, f64, f64); 6] = [
        ("Ca", "Mg", 6.0, 10.0),
        ("Ca", "K", 3.0, 7.0),
        ("Na", "K", 1.8, 4.0),
        ("Na", "Mg", 3.0, 5.0),
        ("Zn", "Cu", 6.0, 10.0),
        ("Ca", "P", 2.0, 3.5),
    ];

    let minerals = mineral_bands
        .into_iter()
        .map(|(symbol, min, max)| (symbol.to_string(), IdealRange::new(min, max, "mg%")))
        .collect();
    let ratios = ratio_bands
        .into_iter()
        .map(|(num, den, min, max)| (ratio_key(num, den), IdealRange::new(min, max, "")))
        .collect();

    RangeTable { minerals, ratios }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_panel() {
        let table = builtin_table();
        for symbol in PANEL_MINERALS {
            assert!(table.mineral(symbol).is_some(), "missing {symbol}");
        }
        for (num, den) in PANEL_RATIOS {
            let key = ratio_key(num, den);
            assert!(table.ratio(&key).is_some(), "missing {key}");
        }
        assert_eq!(table.minerals.len(), 15);
        assert_eq!(table.ratios.len(), 6);
    }

    #[test]
    fn test_builtin_bounds_are_sane() {
        let table = builtin_table();
        for symbol in table.symbols().collect::<Vec<_>>() {
            let range = table.get(symbol).expect("symbol present");
            assert!(range.min >= 0.0, "{symbol} has negative min");
            assert!(range.min < range.max, "{symbol} has min >= max");
        }
    }

    #[test]
    fn test_midpoint_panel_ratios_land_in_band() {
        // All six tracked ratios computed from mineral midpoints must fall
        // inside their own ideal bands; the oxidation midpoint property
        // depends on this alignment.
        let table = builtin_table();
        for (num, den) in PANEL_RATIOS {
            let value = table.mineral(num).expect("num").midpoint()
                / table.mineral(den).expect("den").midpoint();
            let band = table.ratio(&ratio_key(num, den)).expect("band");
            assert!(
                value >= band.min && value <= band.max,
                "midpoint ratio {num}/{den} = {value} outside {}..{}",
                band.min,
                band.max
            );
        }
    }
}
