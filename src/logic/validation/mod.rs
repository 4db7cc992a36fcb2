//! Validation Module - Input checks before prediction
//!
//! `validate_inputs` never fails: schema violations come back as a JSON error
//! list next to the filtered frame.
//!
//! Steps: preparation → feature selection → NA row filter → schema check.

pub mod prepare;

#[cfg(test)]
pub(crate) mod tests;

use serde::{Deserialize, Serialize};

use super::config::{Config, ConfigError};
use super::data::Frame;
use super::schema::InputSchema;

pub use prepare::Preparation;

// ============================================================================
// ERROR PAYLOAD
// ============================================================================

/// One path segment of an error location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocItem {
    Index(usize),
    Key(String),
}

impl From<&str> for LocItem {
    fn from(value: &str) -> Self {
        LocItem::Key(value.to_string())
    }
}

impl From<usize> for LocItem {
    fn from(value: usize) -> Self {
        LocItem::Index(value)
    }
}

/// Structured validation error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub loc: Vec<LocItem>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ValidationIssue {
    pub fn new(loc: Vec<LocItem>, msg: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            loc,
            msg: msg.into(),
            kind: kind.into(),
        }
    }
}

/// Serialize an error list the way it is returned to callers (pretty JSON)
pub fn errors_to_json(issues: &[ValidationIssue]) -> String {
    serde_json::to_string_pretty(issues)
        .unwrap_or_else(|e| format!("[{{\"loc\": [], \"msg\": \"{e}\", \"type\": \"serialization_error\"}}]"))
}

// ============================================================================
// FREE FUNCTIONS
// ============================================================================

/// Drop rows holding a null in any feature outside `vars_with_na`
pub fn drop_na_inputs(mut frame: Frame, features: &[String], vars_with_na: &[&str]) -> Frame {
    let strict: Vec<&String> = features
        .iter()
        .filter(|f| !vars_with_na.contains(&f.as_str()) && frame.null_count(f) > 0)
        .collect();

    if strict.is_empty() {
        return frame;
    }

    let before = frame.len();
    frame.retain_rows(|row| {
        strict
            .iter()
            .all(|f| row.get(f.as_str()).map(|v| !v.is_null()).unwrap_or(false))
    });
    log::debug!(
        "Dropped {} rows with nulls in {:?}",
        before - frame.len(),
        strict
    );
    frame
}

/// Check every record; violations are located as `["inputs", row, field]`
pub fn check_schema(frame: &Frame, schema: &InputSchema) -> Vec<ValidationIssue> {
    frame
        .rows()
        .iter()
        .enumerate()
        .flat_map(|(idx, record)| {
            schema
                .check_record(record)
                .into_iter()
                .map(move |(field, violation)| {
                    ValidationIssue::new(
                        vec!["inputs".into(), idx.into(), LocItem::Key(field)],
                        violation.msg,
                        violation.kind,
                    )
                })
        })
        .collect()
}

// ============================================================================
// INPUT VALIDATOR
// ============================================================================

/// Validator bound to one package config
pub struct InputValidator {
    features: Vec<String>,
    vars_with_na: Vec<String>,
    drop_na_rows: bool,
    schema: InputSchema,
    preparation: Preparation,
}

impl InputValidator {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let model = &config.model_config;
        Ok(Self {
            features: model.features.clone(),
            vars_with_na: model.vars_with_na().into_iter().map(str::to_string).collect(),
            drop_na_rows: model.drop_na_rows,
            schema: model.schema.clone(),
            preparation: Preparation::compile(&model.preparation)?,
        })
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Prepare, select features, filter NA rows, check the schema.
    /// Returns the filtered frame and the serialized errors, if any.
    pub fn validate_inputs(&self, input: Frame) -> (Frame, Option<String>) {
        let prepared = self.preparation.apply(input);
        let mut validated = prepared.select(&self.features);

        if self.drop_na_rows {
            let tolerated: Vec<&str> = self.vars_with_na.iter().map(String::as_str).collect();
            validated = drop_na_inputs(validated, &self.features, &tolerated);
        }

        let issues = check_schema(&validated, &self.schema);
        if issues.is_empty() {
            (validated, None)
        } else {
            log::debug!("Schema check failed with {} issues", issues.len());
            (validated, Some(errors_to_json(&issues)))
        }
    }
}
