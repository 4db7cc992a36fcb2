//! Native Pipeline Artefact
//!
//! JSON description of an externally fitted pipeline: ordered transform steps
//! with their fitted parameters, then an estimator. Loading only deserializes
//! it; nothing here fits anything.
//!
//! ```json
//! {
//!   "name": "regression_model",
//!   "version": "0.1.0",
//!   "features": ["LotFrontage", "OverallQual"],
//!   "steps": [{"type": "fill_numeric", "values": {"LotFrontage": 69.0}}],
//!   "estimator": {"type": "linear", "intercept": 11.2, "coefficients": {"OverallQual": 0.1}}
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::{Pipeline, PipelineError, PipelineMetadata};
use crate::constants::PACKAGE_VERSION;
use crate::logic::config::{Config, PipelineFormat};
use crate::logic::data::{Frame, Value};
use crate::logic::schema::feature_layout_hash;

// ============================================================================
// ARTEFACT FORMAT
// ============================================================================

fn default_rare_label() -> String {
    "Rare".to_string()
}

fn default_threshold() -> f64 {
    0.5
}

/// Fitted transform, applied column-wise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformStep {
    /// Adds `{var}_na` columns: 1.0 where the value is missing
    MissingIndicator { variables: Vec<String> },
    /// Numeric imputation with fitted values
    FillNumeric { values: BTreeMap<String, f64> },
    /// Categorical imputation with a fitted label per variable
    FillCategorical { values: BTreeMap<String, String> },
    /// `reference - var`, e.g. years since remodelling
    ElapsedTime {
        variables: Vec<String>,
        reference: String,
    },
    Drop { variables: Vec<String> },
    /// Natural log; values must be positive
    Log { variables: Vec<String> },
    /// Labels outside the fitted frequent set become `label`
    RareLabels {
        frequent: BTreeMap<String, Vec<String>>,
        #[serde(default = "default_rare_label")]
        label: String,
    },
    /// Label → number (ordinal mapping, target-mean encoding)
    Map {
        variable: String,
        mapping: BTreeMap<String, f64>,
        #[serde(default)]
        unseen: Option<f64>,
    },
    /// `(x - offset) / scale`
    Scale {
        offsets: BTreeMap<String, f64>,
        scales: BTreeMap<String, f64>,
    },
}

/// Final predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Estimator {
    Linear {
        intercept: f64,
        coefficients: BTreeMap<String, f64>,
    },
    /// Outputs the class label (0.0 / 1.0)
    Logistic {
        intercept: f64,
        coefficients: BTreeMap<String, f64>,
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    pub features: Vec<String>,
    /// CRC32 of the feature layout the pipeline was trained on
    #[serde(default)]
    pub schema_hash: Option<u32>,
    #[serde(default)]
    pub steps: Vec<TransformStep>,
    pub estimator: Estimator,
}

// ============================================================================
// WORKING COLUMNS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Missing,
    Num(f64),
    Cat(String),
}

impl Cell {
    fn from_value(value: &Value, feature: &str, row: usize) -> Result<Self, PipelineError> {
        match value {
            v if v.is_null() => Ok(Cell::Missing),
            Value::Int(i) => Ok(Cell::Num(*i as f64)),
            Value::Float(f) => Ok(Cell::Num(*f)),
            Value::Bool(b) => Ok(Cell::Num(if *b { 1.0 } else { 0.0 })),
            Value::Str(s) => Ok(Cell::Cat(s.clone())),
            other => Err(PipelineError::InvalidValue {
                feature: feature.to_string(),
                row,
                reason: format!("unsupported {} value", other.type_name()),
            }),
        }
    }

    fn number(&self, feature: &str, row: usize) -> Result<f64, PipelineError> {
        let reason = match self {
            Cell::Num(x) => return Ok(*x),
            Cell::Cat(s) => match s.trim().parse::<f64>() {
                Ok(x) => return Ok(x),
                Err(_) => format!("non-numeric value {s:?}"),
            },
            Cell::Missing => "missing value".to_string(),
        };
        Err(PipelineError::InvalidValue {
            feature: feature.to_string(),
            row,
            reason,
        })
    }

    fn label(&self) -> Option<String> {
        match self {
            Cell::Cat(s) => Some(s.clone()),
            Cell::Num(x) if x.fract() == 0.0 && x.is_finite() => Some(format!("{}", *x as i64)),
            Cell::Num(x) => Some(x.to_string()),
            Cell::Missing => None,
        }
    }
}

type Columns = BTreeMap<String, Vec<Cell>>;

fn column_mut<'a>(columns: &'a mut Columns, name: &str) -> Result<&'a mut Vec<Cell>, PipelineError> {
    columns
        .get_mut(name)
        .ok_or_else(|| PipelineError::Shape(format!("column {name:?} not present")))
}

fn map_numeric<F>(columns: &mut Columns, name: &str, f: F) -> Result<(), PipelineError>
where
    F: Fn(f64, usize) -> Result<f64, PipelineError>,
{
    for (row, cell) in column_mut(columns, name)?.iter_mut().enumerate() {
        if *cell == Cell::Missing {
            continue;
        }
        let x = cell.number(name, row)?;
        *cell = Cell::Num(f(x, row)?);
    }
    Ok(())
}

impl TransformStep {
    fn apply(&self, columns: &mut Columns) -> Result<(), PipelineError> {
        match self {
            TransformStep::MissingIndicator { variables } => {
                for var in variables {
                    let indicator: Vec<Cell> = column_mut(columns, var)?
                        .iter()
                        .map(|c| Cell::Num(if *c == Cell::Missing { 1.0 } else { 0.0 }))
                        .collect();
                    columns.insert(format!("{var}_na"), indicator);
                }
            }
            TransformStep::FillNumeric { values } => {
                for (var, fill) in values {
                    for cell in column_mut(columns, var)?.iter_mut() {
                        if *cell == Cell::Missing {
                            *cell = Cell::Num(*fill);
                        }
                    }
                }
            }
            TransformStep::FillCategorical { values } => {
                for (var, fill) in values {
                    for cell in column_mut(columns, var)?.iter_mut() {
                        if *cell == Cell::Missing {
                            *cell = Cell::Cat(fill.clone());
                        }
                    }
                }
            }
            TransformStep::ElapsedTime { variables, reference } => {
                let reference_values = column_mut(columns, reference)?.clone();
                for var in variables {
                    for (row, cell) in column_mut(columns, var)?.iter_mut().enumerate() {
                        let elapsed = match (&reference_values[row], &*cell) {
                            (Cell::Missing, _) | (_, Cell::Missing) => Cell::Missing,
                            (r, c) => Cell::Num(r.number(reference, row)? - c.number(var, row)?),
                        };
                        *cell = elapsed;
                    }
                }
            }
            TransformStep::Drop { variables } => {
                for var in variables {
                    columns.remove(var);
                }
            }
            TransformStep::Log { variables } => {
                for var in variables {
                    map_numeric(columns, var, |x, row| {
                        if x > 0.0 {
                            Ok(x.ln())
                        } else {
                            Err(PipelineError::InvalidValue {
                                feature: var.clone(),
                                row,
                                reason: format!("log of non-positive value {x}"),
                            })
                        }
                    })?;
                }
            }
            TransformStep::RareLabels { frequent, label } => {
                for (var, keep) in frequent {
                    for cell in column_mut(columns, var)?.iter_mut() {
                        if let Some(current) = cell.label() {
                            if !keep.contains(&current) {
                                *cell = Cell::Cat(label.clone());
                            }
                        }
                    }
                }
            }
            TransformStep::Map {
                variable,
                mapping,
                unseen,
            } => {
                for (row, cell) in column_mut(columns, variable)?.iter_mut().enumerate() {
                    let mapped = cell
                        .label()
                        .and_then(|l| mapping.get(&l).copied())
                        .or(*unseen);
                    match mapped {
                        Some(x) => *cell = Cell::Num(x),
                        None => {
                            return Err(PipelineError::InvalidValue {
                                feature: variable.clone(),
                                row,
                                reason: format!("unmapped label {:?}", cell.label()),
                            })
                        }
                    }
                }
            }
            TransformStep::Scale { offsets, scales } => {
                for (var, offset) in offsets {
                    let scale = scales.get(var).copied().unwrap_or(1.0);
                    let scale = if scale == 0.0 { 1.0 } else { scale };
                    map_numeric(columns, var, |x, _| Ok((x - offset) / scale))?;
                }
            }
        }
        Ok(())
    }
}

impl Estimator {
    fn coefficients(&self) -> (&BTreeMap<String, f64>, f64) {
        match self {
            Estimator::Linear {
                intercept,
                coefficients,
            }
            | Estimator::Logistic {
                intercept,
                coefficients,
                ..
            } => (coefficients, *intercept),
        }
    }

    /// Design matrix `[rows, coefficients]` in coefficient-name order
    fn design_matrix(
        coefficients: &BTreeMap<String, f64>,
        columns: &Columns,
        rows: usize,
    ) -> Result<Array2<f64>, PipelineError> {
        let cols: Vec<(&String, &Vec<Cell>)> = coefficients
            .keys()
            .map(|name| {
                columns
                    .get(name)
                    .map(|cells| (name, cells))
                    .ok_or_else(|| PipelineError::Shape(format!("column {name:?} not present")))
            })
            .collect::<Result<_, _>>()?;

        let mut data = Vec::with_capacity(rows * cols.len());
        for row in 0..rows {
            for (name, cells) in &cols {
                let cell = cells.get(row).ok_or_else(|| {
                    PipelineError::Shape(format!("column {name:?} has fewer than {rows} rows"))
                })?;
                data.push(cell.number(name, row)?);
            }
        }

        Array2::from_shape_vec((rows, cols.len()), data)
            .map_err(|e| PipelineError::Shape(e.to_string()))
    }

    fn predict(&self, columns: &Columns, rows: usize) -> Result<Vec<f64>, PipelineError> {
        let (coefficients, intercept) = self.coefficients();
        let x = Self::design_matrix(coefficients, columns, rows)?;
        let w: Array1<f64> = coefficients.values().copied().collect();
        let decision = x.dot(&w) + intercept;

        let output = match self {
            Estimator::Linear { .. } => decision,
            Estimator::Logistic { threshold, .. } => decision.mapv(|z| {
                let p = 1.0 / (1.0 + (-z).exp());
                if p >= *threshold {
                    1.0
                } else {
                    0.0
                }
            }),
        };
        Ok(output.to_vec())
    }
}

// ============================================================================
// NATIVE PIPELINE
// ============================================================================

pub struct NativePipeline {
    artifact: PipelineArtifact,
    metadata: PipelineMetadata,
}

impl NativePipeline {
    /// Load an artefact file and check it against the configured layout
    pub fn load(path: &Path, config: &Config, sha256: String) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: PipelineArtifact = serde_json::from_str(&content)?;

        let features = &config.model_config.features;
        match artifact.schema_hash {
            Some(actual) => {
                let expected = feature_layout_hash(features);
                if actual != expected {
                    return Err(PipelineError::LayoutMismatch { expected, actual });
                }
            }
            None if &artifact.features != features => {
                log::warn!(
                    "Pipeline features differ from config ({} vs {})",
                    artifact.features.len(),
                    features.len()
                );
            }
            None => {}
        }

        let mut pipeline = Self::from_artifact(artifact);
        pipeline.metadata.path = path.display().to_string();
        pipeline.metadata.sha256 = sha256;
        Ok(pipeline)
    }

    /// In-memory pipeline (no file)
    pub fn from_artifact(artifact: PipelineArtifact) -> Self {
        let version = artifact
            .version
            .clone()
            .unwrap_or_else(|| PACKAGE_VERSION.to_string());
        if version != PACKAGE_VERSION {
            log::warn!(
                "Pipeline {} was built for v{}, package is v{}",
                artifact.name,
                version,
                PACKAGE_VERSION
            );
        }

        let metadata = PipelineMetadata {
            path: "<memory>".to_string(),
            format: PipelineFormat::Json,
            name: artifact.name.clone(),
            version,
            feature_count: artifact.features.len(),
            sha256: String::new(),
            loaded_at: chrono::Utc::now(),
        };
        Self { artifact, metadata }
    }

    pub fn artifact(&self) -> &PipelineArtifact {
        &self.artifact
    }
}

impl Pipeline for NativePipeline {
    fn predict(&self, frame: &Frame) -> Result<Vec<f64>, PipelineError> {
        let rows = frame.len();
        let mut columns = Columns::new();
        for name in frame.columns() {
            let cells = frame
                .column(name)
                .enumerate()
                .map(|(row, value)| Cell::from_value(value, name, row))
                .collect::<Result<Vec<_>, _>>()?;
            columns.insert(name.clone(), cells);
        }

        for step in &self.artifact.steps {
            step.apply(&mut columns)?;
        }

        self.artifact.estimator.predict(&columns, rows)
    }

    fn metadata(&self) -> &PipelineMetadata {
        &self.metadata
    }
}
