//! Composite Health Scoring
//!
//! Pure scoring over a classified panel. The score reflects how much of
//! the panel sits inside ideal bands AND how severe the outliers are.
//!
//! # Scoring Formula
//!
//! ```text
//! total = mineralScore + ratioScore + redFlagScore
//!
//! mineralScore = (optimal minerals / 15) x 60
//! ratioScore   = (optimal ratios   /  6) x 30
//! redFlagScore = max(0, 10 - penalty)
//!   penalty    = 2 per mineral below 50% of min or above 150% of max
//!              + 1 per violated critical-ratio emergency threshold
//! ```
//!
//! The 60/30/10 pools are the locked semantics weights x 100; the weight
//! invariant is checked at `Semantics::load()`. Grades come from the locked
//! score-band table; changing a band is a semantics-version bump.

mod composer;

pub use composer::{compose, HealthScoreBreakdown, RedFlag};
