//! CSV input/output for the enrichment pipeline.
//!
//! Input headers are matched tolerantly (`name` or `Company Name`, etc.) so
//! both raw exports and previously processed files load without massaging.
//! Output records are appended one at a time and flushed per row, so an
//! interrupted run leaves a valid partial file that a resumed run can read.

use std::fs::File;
use std::path::Path;

use tracing::debug;

use mspscout_shared::{InputRecord, MspScoutError, Result, SummaryRecord};

/// Accepted header spellings per input field, in priority order.
const NAME_HEADERS: &[&str] = &["name", "company name"];
const WEBSITE_HEADERS: &[&str] = &["website"];
const LINKEDIN_HEADERS: &[&str] = &["linkedin"];
const PHONE_HEADERS: &[&str] = &["phone"];
const ADDRESS_HEADERS: &[&str] = &["address", "location"];

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Find the column index for any of the accepted header spellings.
fn find_column(headers: &csv::StringRecord, candidates: &[&str]) -> Option<usize> {
    for candidate in candidates {
        if let Some(idx) = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(candidate))
        {
            return Some(idx);
        }
    }
    None
}

/// Read the source company list. Requires a name column; all other columns
/// are optional and default to empty.
pub fn read_input(path: &Path) -> Result<Vec<InputRecord>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        MspScoutError::validation(format!("cannot read input {}: {e}", path.display()))
    })?;

    let headers = reader
        .headers()
        .map_err(|e| MspScoutError::validation(format!("bad input header: {e}")))?
        .clone();

    let name_idx = find_column(&headers, NAME_HEADERS).ok_or_else(|| {
        MspScoutError::validation(format!(
            "input {} has no company-name column (expected one of: {})",
            path.display(),
            NAME_HEADERS.join(", ")
        ))
    })?;
    let website_idx = find_column(&headers, WEBSITE_HEADERS);
    let linkedin_idx = find_column(&headers, LINKEDIN_HEADERS);
    let phone_idx = find_column(&headers, PHONE_HEADERS);
    let address_idx = find_column(&headers, ADDRESS_HEADERS);

    let field = |record: &csv::StringRecord, idx: Option<usize>| -> String {
        idx.and_then(|i| record.get(i))
            .unwrap_or_default()
            .trim()
            .to_string()
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| MspScoutError::validation(format!("bad input row: {e}")))?;
        rows.push(InputRecord {
            name: field(&record, Some(name_idx)),
            website: field(&record, website_idx),
            linkedin: field(&record, linkedin_idx),
            phone: field(&record, phone_idx),
            address: field(&record, address_idx),
        });
    }

    debug!(rows = rows.len(), path = %path.display(), "input loaded");
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Read a prior output file, e.g. to build the resume index.
/// A missing file is an empty prior run, not an error.
pub fn read_output(path: &Path) -> Result<Vec<SummaryRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        MspScoutError::validation(format!("cannot read output {}: {e}", path.display()))
    })?;

    let mut rows = Vec::new();
    for record in reader.deserialize::<SummaryRecord>() {
        rows.push(
            record.map_err(|e| MspScoutError::validation(format!("bad output row: {e}")))?,
        );
    }
    Ok(rows)
}

/// Incremental writer for [`SummaryRecord`] rows.
pub struct SummaryWriter {
    writer: csv::Writer<File>,
}

impl SummaryWriter {
    /// Open `path` for writing. When `append` is set and the file already
    /// has content, new rows are added after the existing ones and the
    /// header is not repeated; otherwise the file is created fresh.
    pub fn open(path: &Path, append: bool) -> Result<Self> {
        let has_content = append
            && std::fs::metadata(path)
                .map(|m| m.len() > 0)
                .unwrap_or(false);

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(has_content)
            .write(true)
            .truncate(!has_content)
            .open(path)
            .map_err(|e| MspScoutError::io(path, e))?;

        let writer = csv::WriterBuilder::new()
            .has_headers(!has_content)
            .from_writer(file);

        Ok(Self { writer })
    }

    /// Append one record and flush, so interruption never loses completed rows.
    pub fn append(&mut self, record: &SummaryRecord) -> Result<()> {
        self.writer
            .serialize(record)
            .map_err(|e| MspScoutError::validation(format!("output row serialize: {e}")))?;
        self.writer
            .flush()
            .map_err(|e| MspScoutError::validation(format!("output flush: {e}")))?;
        Ok(())
    }
}
