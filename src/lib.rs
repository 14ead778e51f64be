//! Solar Compare - cleaning & cross-country comparison of solar irradiance logs
//!
//! Ingests per-country station logs (Benin, Sierra Leone, Togo), cleans them,
//! and produces grouped summaries plus rank-based significance tests for a dashboard.

pub mod config;
pub mod data;
pub mod export;
pub mod pipeline;
pub mod stats;

pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{Artifacts, Pipeline, RunOutcome};
