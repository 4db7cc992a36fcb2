//! Pre-pipeline Preparation
//!
//! Config-driven cleanup run before feature selection:
//! markers → null, renames, first-token cuts, regex-derived columns,
//! float casts, dropped fields. Regexes are compiled once at startup.

use regex::Regex;

use crate::logic::config::{ConfigError, PreparationConfig};
use crate::logic::data::{Frame, Value};

struct CompiledExtract {
    source: String,
    target: String,
    patterns: Vec<Regex>,
    fallback: String,
}

impl CompiledExtract {
    fn label(&self, value: &Value) -> Value {
        let Some(text) = value.as_label() else {
            return Value::Null;
        };
        self.patterns
            .iter()
            .find(|re| re.is_match(&text))
            .map(|re| Value::Str(re.as_str().to_string()))
            .unwrap_or_else(|| Value::Str(self.fallback.clone()))
    }
}

pub struct Preparation {
    config: PreparationConfig,
    extracts: Vec<CompiledExtract>,
}

impl Preparation {
    pub fn compile(config: &PreparationConfig) -> Result<Self, ConfigError> {
        let extracts = config
            .extract
            .iter()
            .map(|rule| {
                let patterns = rule
                    .patterns
                    .iter()
                    .map(|p| {
                        Regex::new(p).map_err(|source| ConfigError::Pattern {
                            pattern: p.clone(),
                            source,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledExtract {
                    source: rule.source.clone(),
                    target: rule.target.clone(),
                    patterns,
                    fallback: rule.fallback.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            config: config.clone(),
            extracts,
        })
    }

    /// Run every step in order
    pub fn apply(&self, mut frame: Frame) -> Frame {
        frame.replace_markers(&self.config.na_values);

        for (from, to) in &self.config.rename {
            frame.rename_column(from, to);
        }

        for column in &self.config.first_token {
            frame.map_column(column, first_token);
        }

        for extract in &self.extracts {
            if frame.has_column(&extract.source) {
                frame.derive_column(&extract.source, &extract.target, |v| extract.label(v));
            }
        }

        for column in &self.config.cast_float {
            frame.map_column(column, cast_float);
        }

        frame.drop_columns(&self.config.drop);
        frame
    }
}

fn first_token(value: &Value) -> Value {
    match value {
        Value::Str(s) => s
            .split_whitespace()
            .next()
            .map(|t| Value::Str(t.to_string()))
            .unwrap_or(Value::Null),
        other => other.clone(),
    }
}

/// Non-numeric strings are left alone so the schema check reports them
fn cast_float(value: &Value) -> Value {
    match value {
        Value::Int(i) => Value::Float(*i as f64),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}
