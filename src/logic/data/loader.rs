//! Dataset Loader - CSV files into frames
//!
//! Cells are typed on read (int, float, string). The marker set below is the
//! one pandas treats as missing by default.

use std::fs::File;
use std::path::Path;

use super::{DataError, Frame, Record, Value};

/// Strings read as null
pub const DEFAULT_NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Load a CSV dataset with a header row
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Frame, DataError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let frame = read_csv(file)?;
    log::info!(
        "Loaded dataset {} ({} rows, {} columns)",
        path.display(),
        frame.len(),
        frame.columns().len()
    );
    Ok(frame)
}

/// Parse CSV from any reader
pub fn read_csv<R: std::io::Read>(reader: R) -> Result<Frame, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut frame = Frame::new(headers.clone());

    for result in reader.records() {
        let record = result?;
        // Short rows leave trailing columns null
        let row: Record = headers
            .iter()
            .zip(record.iter())
            .map(|(name, cell)| (name.clone(), parse_cell(cell)))
            .collect();
        frame.push_row(row);
    }

    Ok(frame)
}

/// Type a raw CSV cell
pub fn parse_cell(cell: &str) -> Value {
    if DEFAULT_NA_VALUES.contains(&cell) {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = cell.parse::<f64>() {
        if f.is_finite() {
            return Value::Float(f);
        }
    }
    Value::Str(cell.to_string())
}
