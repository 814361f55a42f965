//! Lead ingestion: tabular source reading, column resolution and sanitizing.
//!
//! This crate provides:
//! - [`source`]: reads the first (or a named) worksheet of a workbook
//! - [`columns`]: maps arbitrary headers onto name/website/email
//! - [`sanitize`]: trims, validates and deduplicates lead records

pub mod columns;
pub mod sanitize;
pub mod source;

pub use columns::{ColumnResolver, ColumnRule, DEFAULT_RULES, resolve_columns};
pub use sanitize::{SanitizedLeads, is_valid_email, sanitize_leads, sanitize_url};
pub use source::{RawTable, read_table};

use std::path::Path;

use pagepitch_shared::{CanonicalField, FieldMap, LeadRecord, Result};
use tracing::{debug, info, instrument};

/// Leads read from a source, before sanitizing.
#[derive(Debug, Clone)]
pub struct IngestedLeads {
    /// How the source columns were mapped.
    pub field_map: FieldMap,
    /// Every data row projected onto the three lead fields.
    pub records: Vec<LeadRecord>,
}

/// Read a workbook and project its rows onto lead records.
///
/// Fails for the whole source when the file cannot be read or the
/// name/website/email columns cannot all be resolved.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn ingest(path: &Path, sheet: Option<&str>) -> Result<IngestedLeads> {
    let table = read_table(path, sheet)?;
    let field_map = resolve_columns(&table.columns)?;

    info!(
        name = %field_map.name.header,
        website = %field_map.website.header,
        email = %field_map.email.header,
        rows = table.rows.len(),
        "resolved lead columns"
    );
    for field in CanonicalField::ALL {
        debug!(field = %field, index = field_map.column(field).index, "column position");
    }

    let records = table.rows.iter().map(|row| field_map.project(row)).collect();

    Ok(IngestedLeads { field_map, records })
}
