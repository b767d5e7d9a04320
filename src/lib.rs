//! Strandlab - deterministic HTMA interpretation engine
//!
//! Interprets hair-tissue mineral measurements into labeled statuses, a
//! composite health score, an explained score change, a metabolic-pattern
//! classification, and safety-filtered narrative text, under strict
//! versioning and audit requirements.
//!
//! The core is a synchronous, side-effect-free computation pipeline:
//! presentation, document rendering, external text generation, and
//! persistence are collaborators around it, never inside it.

pub mod cli;
pub mod config;
pub mod delta;
pub mod guardrails;
pub mod models;
pub mod oxidation;
pub mod pipeline;
pub mod registry;
pub mod reporters;
pub mod scoring;
pub mod snapshot;

pub use config::{Semantics, ENGINE_VERSION, SEMANTICS_VERSION};
pub use pipeline::{InterpretationPipeline, InterpretationRequest, PipelineError};
pub use registry::ReferenceRangeRegistry;
pub use snapshot::ReportSnapshot;
