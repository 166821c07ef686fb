//! Deduplicate a summaries CSV by normalized company name.
//!
//! Column-agnostic: all columns pass through untouched, only row identity
//! is interpreted. Rows with a blank name are dropped.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, instrument};

use mspscout_shared::{MspScoutError, Result, normalize_name};

/// Which duplicate to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeepPolicy {
    /// Keep the first occurrence (default).
    #[default]
    First,
    /// Keep the last occurrence, in the first occurrence's position.
    Last,
}

impl std::str::FromStr for KeepPolicy {
    type Err = MspScoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            other => Err(MspScoutError::validation(format!(
                "invalid keep policy '{other}': expected 'first' or 'last'"
            ))),
        }
    }
}

/// Deduplicate `input_csv` into `output_csv` by normalized company name.
/// Returns `(total_rows, unique_rows)`.
#[instrument(skip_all, fields(input = %input_csv.display(), ?keep))]
pub fn dedupe_summaries(
    input_csv: &Path,
    output_csv: &Path,
    name_field: &str,
    keep: KeepPolicy,
) -> Result<(usize, usize)> {
    let mut reader = csv::Reader::from_path(input_csv).map_err(|e| {
        MspScoutError::validation(format!("cannot read {}: {e}", input_csv.display()))
    })?;

    let headers = reader
        .headers()
        .map_err(|e| MspScoutError::validation(format!("bad header: {e}")))?
        .clone();

    let name_idx = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name_field))
        .ok_or_else(|| {
            MspScoutError::validation(format!(
                "{} has no '{name_field}' column",
                input_csv.display()
            ))
        })?;

    // Keyed rows in first-seen order.
    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, csv::StringRecord> = HashMap::new();
    let mut total_rows = 0usize;

    for record in reader.records() {
        let record =
            record.map_err(|e| MspScoutError::validation(format!("bad row: {e}")))?;
        total_rows += 1;

        let key = normalize_name(record.get(name_idx).unwrap_or_default());
        if key.is_empty() {
            continue;
        }

        match by_key.entry(key.clone()) {
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(record);
                order.push(key);
            }
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                if keep == KeepPolicy::Last {
                    slot.insert(record);
                }
            }
        }
    }

    if let Some(parent) = output_csv.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MspScoutError::io(parent, e))?;
    }

    let mut writer = csv::Writer::from_path(output_csv).map_err(|e| {
        MspScoutError::validation(format!("cannot write {}: {e}", output_csv.display()))
    })?;
    writer
        .write_record(&headers)
        .map_err(|e| MspScoutError::validation(format!("write header: {e}")))?;
    for key in &order {
        writer
            .write_record(&by_key[key])
            .map_err(|e| MspScoutError::validation(format!("write row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| MspScoutError::validation(format!("flush: {e}")))?;

    info!(total_rows, unique_rows = order.len(), "deduplicated summaries");
    Ok((total_rows, order.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mspscout_dedupe_{}_{name}.csv", Uuid::now_v7()))
    }

    const SAMPLE: &str = "name,summary\n\
        Acme IT,first acme\n\
        Beta Networks,beta\n\
        acme  it,second acme\n\
        ,nameless\n";

    #[test]
    fn keep_first_collapses_normalized_duplicates() {
        let input = temp_file("in_first");
        let output = temp_file("out_first");
        std::fs::write(&input, SAMPLE).unwrap();

        let (total, unique) =
            dedupe_summaries(&input, &output, "name", KeepPolicy::First).expect("dedupe");
        assert_eq!(total, 4);
        assert_eq!(unique, 2);

        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.contains("first acme"));
        assert!(!content.contains("second acme"));
        assert!(!content.contains("nameless"));

        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);
    }

    #[test]
    fn keep_last_takes_later_row() {
        let input = temp_file("in_last");
        let output = temp_file("out_last");
        std::fs::write(&input, SAMPLE).unwrap();

        let (_, unique) =
            dedupe_summaries(&input, &output, "name", KeepPolicy::Last).expect("dedupe");
        assert_eq!(unique, 2);

        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.contains("second acme"));
        assert!(!content.contains("first acme"));

        // First-seen order is preserved even when keeping the last row.
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[1].contains("acme"));
        assert!(lines[2].contains("Beta"));

        let _ = std::fs::remove_file(&input);
        let _ = std::fs::remove_file(&output);
    }

    #[test]
    fn keep_policy_parses() {
        assert_eq!("first".parse::<KeepPolicy>().unwrap(), KeepPolicy::First);
        assert_eq!("last".parse::<KeepPolicy>().unwrap(), KeepPolicy::Last);
        assert!("middle".parse::<KeepPolicy>().is_err());
    }
}
