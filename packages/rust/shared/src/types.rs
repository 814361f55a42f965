//! Core domain types for PagePitch runs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder used for timing metrics the scoring service did not report.
pub const NOT_AVAILABLE: &str = "N/A";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline execution (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// The three semantic fields every lead source must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Name,
    Website,
    Email,
}

impl CanonicalField {
    /// All canonical fields in resolution order.
    pub const ALL: [CanonicalField; 3] = [Self::Name, Self::Website, Self::Email];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Website => "website",
            Self::Email => "email",
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source column picked for a canonical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedColumn {
    /// Zero-based position of the column in the source.
    pub index: usize,
    /// Normalized (trimmed, lowercased) header text.
    pub header: String,
}

/// Resolved correspondence between canonical fields and source columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMap {
    pub name: ResolvedColumn,
    pub website: ResolvedColumn,
    pub email: ResolvedColumn,
}

impl FieldMap {
    /// Column resolved for `field`.
    pub fn column(&self, field: CanonicalField) -> &ResolvedColumn {
        match field {
            CanonicalField::Name => &self.name,
            CanonicalField::Website => &self.website,
            CanonicalField::Email => &self.email,
        }
    }

    /// Project one row of cells onto a [`LeadRecord`].
    ///
    /// Cells are copied verbatim; cells past the end of a short row read as
    /// empty strings. Trimming and validation belong to the sanitizer.
    pub fn project(&self, cells: &[String]) -> LeadRecord {
        let cell = |col: &ResolvedColumn| cells.get(col.index).cloned().unwrap_or_default();
        LeadRecord {
            name: cell(&self.name),
            website: cell(&self.website),
            email: cell(&self.email),
        }
    }
}

// ---------------------------------------------------------------------------
// LeadRecord / PerformanceReport
// ---------------------------------------------------------------------------

/// A prospective contact sourced from the lead spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub name: String,
    /// Website as written in the source (scheme not yet normalized).
    pub website: String,
    pub email: String,
}

/// Performance score and timing metrics for one website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Performance score, 0–100.
    pub score: u8,
    /// First Contentful Paint, as displayed by the scoring service.
    pub first_contentful_paint: String,
    /// Speed Index display string.
    pub speed_index: String,
    /// Time to Interactive display string.
    pub time_to_interactive: String,
    /// The sanitized URL that was actually scored.
    pub tested_url: String,
}

// ---------------------------------------------------------------------------
// Outcomes and tally
// ---------------------------------------------------------------------------

/// Why a record ended without an email being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The record reached the orchestrator with a blank website.
    MissingWebsite,
    /// The scorer produced no report.
    NoScore,
    /// The renderer failed, or reported success without writing a file.
    NoArtifact,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::MissingWebsite => "missing website",
            Self::NoScore => "missing PageSpeed data",
            Self::NoArtifact => "no PDF generated",
        })
    }
}

/// Terminal state of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Sent,
    Failed { reason: String },
    Skipped(SkipReason),
}

/// Aggregate sent/failed/skipped counters for one run.
///
/// Counters only ever increase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTally {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunTally {
    /// Count one terminal outcome.
    pub fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Sent => self.sent += 1,
            RecordOutcome::Failed { .. } => self.failed += 1,
            RecordOutcome::Skipped(_) => self.skipped += 1,
        }
    }

    /// Number of records that reached a terminal state.
    pub fn total(&self) -> usize {
        self.sent + self.failed + self.skipped
    }
}

impl std::fmt::Display for RunTally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Sent: {} | Failed: {} | Skipped: {}",
            self.sent, self.failed, self.skipped
        )
    }
}
