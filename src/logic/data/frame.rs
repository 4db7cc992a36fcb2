//! Frame - ordered rows of named cells
//!
//! Column order is kept separately from the rows so selections and CSV
//! headers stay stable. A column missing from a row reads as null.

use std::collections::BTreeMap;

use super::{DataError, Value};

/// One input row
pub type Record = BTreeMap<String, Value>;

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build from records; columns are collected in first-seen order
    pub fn from_records(rows: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    /// Accepts a list of records, a column mapping of equal-length lists, or
    /// a single mapping of scalars (one row)
    pub fn from_json(value: &serde_json::Value) -> Result<Self, DataError> {
        match value {
            serde_json::Value::Array(items) => {
                let mut rows = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    let object = item.as_object().ok_or_else(|| {
                        DataError::UnsupportedShape(format!(
                            "record {idx} is {}, expected an object",
                            json_kind(item)
                        ))
                    })?;
                    rows.push(
                        object
                            .iter()
                            .map(|(k, v)| (k.clone(), Value::from(v)))
                            .collect(),
                    );
                }
                Ok(Self::from_records(rows))
            }
            serde_json::Value::Object(map) => {
                let columnar = map.values().any(|v| v.is_array());
                if !columnar {
                    let row: Record = map.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect();
                    return Ok(Self::from_records(vec![row]));
                }

                // Scalars broadcast across the rows defined by the list columns
                let mut expected: Option<usize> = None;
                for (column, values) in map {
                    let Some(found) = values.as_array().map(Vec::len) else {
                        continue;
                    };
                    match expected {
                        None => expected = Some(found),
                        Some(len) if len != found => {
                            return Err(DataError::RaggedColumn {
                                column: column.clone(),
                                expected: len,
                                found,
                            });
                        }
                        _ => {}
                    }
                }

                let len = expected.unwrap_or(0);
                let mut frame = Self::new(map.keys().cloned().collect());
                frame.rows = vec![Record::new(); len];
                for (column, values) in map {
                    match values.as_array() {
                        Some(values) => {
                            for (row, value) in frame.rows.iter_mut().zip(values) {
                                row.insert(column.clone(), Value::from(value));
                            }
                        }
                        None => {
                            let value = Value::from(values);
                            for row in frame.rows.iter_mut() {
                                row.insert(column.clone(), value.clone());
                            }
                        }
                    }
                }
                Ok(frame)
            }
            other => Err(DataError::UnsupportedShape(format!(
                "top-level {} (expected records or a column mapping)",
                json_kind(other)
            ))),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn push_row(&mut self, row: Record) {
        for key in row.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    /// Cell at (row, column); absent cells read as null
    pub fn get(&self, row: usize, column: &str) -> &Value {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL)
    }

    /// All values of one column, nulls included
    pub fn column(&self, name: &str) -> impl Iterator<Item = &Value> + '_ {
        let name = name.to_string();
        self.rows
            .iter()
            .map(move |r| r.get(&name).unwrap_or(&NULL))
    }

    pub fn null_count(&self, name: &str) -> usize {
        self.column(name).filter(|v| v.is_null()).count()
    }

    pub fn rename_column(&mut self, from: &str, to: &str) {
        if !self.has_column(from) {
            return;
        }
        for column in self.columns.iter_mut() {
            if column == from {
                *column = to.to_string();
            }
        }
        for row in self.rows.iter_mut() {
            if let Some(value) = row.remove(from) {
                row.insert(to.to_string(), value);
            }
        }
    }

    pub fn drop_columns(&mut self, names: &[String]) {
        self.columns.retain(|c| !names.contains(c));
        for row in self.rows.iter_mut() {
            row.retain(|k, _| !names.contains(k));
        }
    }

    /// Apply `f` to every cell of a column (absent cells are passed as null)
    pub fn map_column<F>(&mut self, name: &str, mut f: F)
    where
        F: FnMut(&Value) -> Value,
    {
        if !self.has_column(name) {
            return;
        }
        for row in self.rows.iter_mut() {
            let current = row.get(name).unwrap_or(&NULL);
            let next = f(current);
            row.insert(name.to_string(), next);
        }
    }

    /// Fill `target` from `source` cell by cell
    pub fn derive_column<F>(&mut self, source: &str, target: &str, mut f: F)
    where
        F: FnMut(&Value) -> Value,
    {
        if !self.has_column(target) {
            self.columns.push(target.to_string());
        }
        for row in self.rows.iter_mut() {
            let next = f(row.get(source).unwrap_or(&NULL));
            row.insert(target.to_string(), next);
        }
    }

    /// Replace every string cell equal to a marker with null
    pub fn replace_markers(&mut self, markers: &[String]) {
        if markers.is_empty() {
            return;
        }
        for row in self.rows.iter_mut() {
            for value in row.values_mut() {
                if let Value::Str(s) = value {
                    if markers.iter().any(|m| m == s) {
                        *value = Value::Null;
                    }
                }
            }
        }
    }

    /// Projection onto `columns`, in that order; missing columns become null
    pub fn select(&self, columns: &[String]) -> Frame {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect();
        Frame {
            columns: columns.to_vec(),
            rows,
        }
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Record) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    /// Records as JSON objects, with NaN normalised to null
    pub fn to_json_records(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.rows
                .iter()
                .map(|row| {
                    let object = self
                        .columns
                        .iter()
                        .map(|c| {
                            let value = row.get(c).unwrap_or(&NULL);
                            let json = if value.is_null() {
                                serde_json::Value::Null
                            } else {
                                serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
                            };
                            (c.clone(), json)
                        })
                        .collect();
                    serde_json::Value::Object(object)
                })
                .collect(),
        )
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a bool",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
