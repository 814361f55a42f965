//! Tabular lead source backed by `calamine` (xlsx, xlsm, xls, ods).

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use tracing::debug;

use pagepitch_shared::{PagePitchError, Result};

/// Header row plus data rows, every cell rendered as display text.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Header cells in source order, as written.
    pub columns: Vec<String>,
    /// Data rows; blank rows are already removed.
    pub rows: Vec<Vec<String>>,
}

/// Read the named worksheet (or the first one) of a workbook.
///
/// The first row is the header row. Rows whose cells are all blank are
/// dropped.
pub fn read_table(path: &Path, sheet: Option<&str>) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        PagePitchError::ingest(format!("could not open {}: {e}", path.display()))
    })?;

    let range = match sheet {
        Some(name) => workbook
            .worksheet_range(name)
            .map_err(|e| PagePitchError::ingest(format!("sheet '{name}' not readable: {e}")))?,
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| PagePitchError::ingest("workbook has no worksheets"))?
            .map_err(|e| PagePitchError::ingest(format!("first sheet not readable: {e}")))?,
    };

    let mut rows = range.rows();
    let columns: Vec<String> = rows
        .next()
        .ok_or_else(|| PagePitchError::ingest(format!("{} has no header row", path.display())))?
        .iter()
        .map(cell_text)
        .collect();

    let rows: Vec<Vec<String>> = rows
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
        .filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
        .collect();

    debug!(columns = columns.len(), rows = rows.len(), "read lead table");

    Ok(RawTable { columns, rows })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}
