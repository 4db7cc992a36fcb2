//! Schema Module - Typed input schema
//!
//! Every schema field is optional: null always passes. Non-null values are
//! checked with lenient coercion (integer strings are ints, numbers are
//! accepted as strings). Checking never rewrites the value.
//!
//! Fields present in a record but absent from the schema are ignored.

pub mod layout;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::data::{Record, Value};

pub use layout::{feature_layout_hash, LayoutInfo};

// ============================================================================
// FIELD KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Int,
    Float,
    Str,
    StrOrInt,
}

/// A field check failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub msg: &'static str,
    pub kind: &'static str,
}

impl FieldKind {
    /// Check one value against this kind
    pub fn check(&self, value: &Value) -> Result<(), FieldViolation> {
        if value.is_null() {
            return Ok(());
        }

        let accepted = match (self, value) {
            (_, Value::Bool(_)) | (_, Value::Nested(_)) => false,
            (FieldKind::Int, Value::Int(_)) => true,
            (FieldKind::Int, Value::Float(f)) => f.is_finite(),
            (FieldKind::Int, Value::Str(s)) => s.trim().parse::<i64>().is_ok(),
            (FieldKind::Float, Value::Int(_)) | (FieldKind::Float, Value::Float(_)) => true,
            (FieldKind::Float, Value::Str(s)) => s.trim().parse::<f64>().is_ok(),
            (FieldKind::Str, _) | (FieldKind::StrOrInt, _) => true,
            (_, Value::Null) => true,
        };

        if accepted {
            Ok(())
        } else {
            Err(self.violation())
        }
    }

    fn violation(&self) -> FieldViolation {
        match self {
            FieldKind::Int => FieldViolation {
                msg: "value is not a valid integer",
                kind: "type_error.integer",
            },
            FieldKind::Float => FieldViolation {
                msg: "value is not a valid float",
                kind: "type_error.float",
            },
            FieldKind::Str => FieldViolation {
                msg: "str type expected",
                kind: "type_error.str",
            },
            FieldKind::StrOrInt => FieldViolation {
                msg: "value is not a valid str or integer",
                kind: "type_error.union",
            },
        }
    }
}

// ============================================================================
// INPUT SCHEMA
// ============================================================================

/// Declared input fields and their types
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputSchema {
    fields: BTreeMap<String, FieldKind>,
}

impl InputSchema {
    pub fn new(fields: BTreeMap<String, FieldKind>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<FieldKind> {
        self.fields.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldKind)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// All violations in one record, in field order
    pub fn check_record(&self, record: &Record) -> Vec<(String, FieldViolation)> {
        self.fields
            .iter()
            .filter_map(|(name, kind)| {
                let value = record.get(name)?;
                kind.check(value).err().map(|v| (name.clone(), v))
            })
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
