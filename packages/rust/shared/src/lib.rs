//! Shared types, error model, and configuration for PagePitch.
//!
//! This crate is the foundation depended on by all other PagePitch crates.
//! It provides:
//! - [`PagePitchError`]: the unified error type for fatal conditions
//! - Domain types ([`LeadRecord`], [`FieldMap`], [`PerformanceReport`], [`RunTally`])
//! - Configuration ([`AppConfig`], [`RuntimeConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, InputConfig, PageSpeedConfig, PipelineConfig, RenderConfig, RendererSection,
    RunSection, RuntimeConfig, ScoringConfig, SmtpConfig, SmtpSection, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{PagePitchError, Result};
pub use types::{
    CanonicalField, FieldMap, LeadRecord, NOT_AVAILABLE, PerformanceReport, RecordOutcome,
    ResolvedColumn, RunId, RunTally, SkipReason,
};
