//! Core pipeline orchestration for PagePitch.
//!
//! This crate ties together lead ingestion, scoring, report rendering and
//! dispatch into the per-record outreach state machine.

pub mod artifact;
pub mod pipeline;
pub mod stages;

pub use artifact::{ArtifactGuard, artifact_path, artifact_slug, remove_artifact};
pub use pipeline::{Pipeline, ProgressReporter, SilentProgress, load_leads, run_outreach};
pub use stages::{Dispatcher, Renderer, Scorer};
