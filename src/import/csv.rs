use serde_json::{Map, Value};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Result;

/// Read a CSV export into the same row payloads the HTTP endpoint accepts.
///
/// Headers are matched case-insensitively with spaces treated as underscores,
/// so `Staff Email` maps to `staff_email`. Blank cells are left out.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<Value>> {
    let mut rdr = ::csv::ReaderBuilder::new()
        .trim(::csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(normalize_header).collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let object: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, field)| !field.is_empty())
            .map(|(header, field)| (header.clone(), Value::String(field.to_string())))
            .collect();
        rows.push(Value::Object(object));
    }

    Ok(rows)
}

pub fn read_rows_from_path(path: &Path) -> Result<Vec<Value>> {
    let file = File::open(path)?;
    read_rows(file)
}

fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace([' ', '-'], "_")
}
