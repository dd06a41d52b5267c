//! Spreadsheet export of collected records.
//!
//! Columns are `Sr No.` (1-based row number) followed by every record key
//! in first-seen order. Non-string values are written as compact JSON;
//! missing keys and `null` become empty cells. Records that are not JSON
//! objects have no columns to fill and are skipped.

use crate::error::ExportError;
use crate::output::Record;
use chrono::{DateTime, TimeZone};
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Name of the row-number column.
pub const SERIAL_COLUMN: &str = "Sr No.";

/// A rectangular table ready to be written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Lay records out as rows.
pub fn build_table(records: &[Record]) -> Table {
    let objects: Vec<_> = records
        .iter()
        .filter_map(|r| {
            let obj = r.as_object();
            if obj.is_none() {
                warn!("Skipping non-object record: {}", r);
            }
            obj
        })
        .collect();

    let mut keys: Vec<&str> = Vec::new();
    for obj in &objects {
        for key in obj.keys() {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
    }

    let rows = objects
        .iter()
        .enumerate()
        .map(|(i, obj)| {
            std::iter::once((i + 1).to_string())
                .chain(keys.iter().map(|k| cell(obj.get(*k))))
                .collect()
        })
        .collect();

    Table {
        columns: std::iter::once(SERIAL_COLUMN.to_string())
            .chain(keys.iter().map(|k| k.to_string()))
            .collect(),
        rows,
    }
}

fn cell(value: Option<&Record>) -> String {
    match value {
        None | Some(Record::Null) => String::new(),
        Some(Record::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Write `table` as CSV.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&table.columns)?;
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Write `table` as CSV to `path`, creating parent directories.
pub fn write_csv_file(table: &Table, path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let file = std::fs::File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_csv(table, file)
}

/// `challan_output_YYYYMMDD_HHMMSS.csv` for the given time.
pub fn default_output_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("challan_output_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn columns_follow_first_seen_order() {
        let records = vec![
            json!({"Date of Invoice": "01/01/2024", "SC No.": "", "Filename": "a.pdf"}),
            json!({"SC No.": "9", "Extra": "x", "Filename": "b.pdf"}),
        ];
        let table = build_table(&records);
        assert_eq!(
            table.columns,
            ["Sr No.", "Date of Invoice", "SC No.", "Filename", "Extra"]
        );
        assert_eq!(table.rows[0], ["1", "01/01/2024", "", "a.pdf", ""]);
        assert_eq!(table.rows[1], ["2", "", "9", "b.pdf", "x"]);
    }

    #[test]
    fn non_string_values_are_json() {
        let table = build_table(&[json!({"Serial Nos.": ["S1", "S2"], "Qty of Units": 2, "n": null})]);
        assert_eq!(table.rows[0], ["1", r#"["S1","S2"]"#, "2", ""]);
    }

    #[test]
    fn non_objects_are_skipped() {
        let table = build_table(&[json!("loose"), json!({"a": "1"})]);
        assert_eq!(table.rows, vec![vec!["1".to_string(), "1".to_string()]]);
    }

    #[test]
    fn csv_output_quotes_fields() {
        let table = build_table(&[json!({"Pick up address": "12, MG Road"})]);
        let mut buf = Vec::new();
        write_csv(&table, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Sr No.,Pick up address\n1,\"12, MG Road\"\n"
        );
    }

    #[test]
    fn csv_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/sub/table.csv");
        write_csv_file(&build_table(&[json!({"a": "1"})]), &path).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Sr No.,a\n1,1\n");
    }

    #[test]
    fn output_name_is_timestamped() {
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(default_output_name(&t), "challan_output_20240309_140507.csv");
    }
}
