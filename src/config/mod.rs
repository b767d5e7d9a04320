//! Configuration: locked semantic constants and version stamps
//!
//! The interpretation semantics (score weights, grade bands, disclaimers,
//! emergency thresholds) are locked data validated once at load. A change to
//! any of them is a semantics change and requires a `SEMANTICS_VERSION`
//! bump, never a silent edit.

mod semantics;

pub use semantics::{
    ConfigError, CriticalRatioRule, Disclaimers, RatioBound, ScoreBand, Semantics,
    ENGINE_VERSION, SEMANTICS_VERSION,
};
