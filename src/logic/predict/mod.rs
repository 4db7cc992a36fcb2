//! Predict Module - Validated prediction over a loaded pipeline
//!
//! `make_prediction` is the public entry point of both packages. It never
//! fails: invalid input and pipeline evaluation errors come back in the
//! `errors` field of the result.


use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::config::{Config, ConfigError, PipelineFormat};
use super::data::Frame;
use super::pipeline::{Pipeline, PipelineError, PipelineLoader, PipelineMetadata};
use super::validation::{errors_to_json, InputValidator, ValidationIssue};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Result of one `make_prediction` call.
/// Exactly one of `predictions` / `errors` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predictions: Option<Vec<f64>>,
    pub version: String,
    pub errors: Option<String>,
}

impl PredictionResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_none()
    }
}

/// Raw input accepted by `make_prediction`
#[derive(Debug, Clone)]
pub enum PredictionInput {
    /// Records, a column mapping, or a single record
    Json(serde_json::Value),
    Frame(Frame),
}

impl From<serde_json::Value> for PredictionInput {
    fn from(value: serde_json::Value) -> Self {
        PredictionInput::Json(value)
    }
}

impl From<Frame> for PredictionInput {
    fn from(frame: Frame) -> Self {
        PredictionInput::Frame(frame)
    }
}

/// Predictor status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorStatus {
    pub package_name: String,
    pub version: String,
    pub pipeline_name: String,
    pub pipeline_path: String,
    pub pipeline_format: PipelineFormat,
    pub feature_count: usize,
    pub requests: u64,
    pub rejected: u64,
    pub rows_predicted: u64,
    pub avg_latency_ms: f32,
}

/// Startup failure while building a predictor
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    rejected: AtomicU64,
    rows_predicted: AtomicU64,
    latency_sum_us: AtomicU64,
}

// ============================================================================
// PREDICTOR
// ============================================================================

pub struct Predictor {
    version: String,
    pipeline: Box<dyn Pipeline>,
    config: Config,
    validator: InputValidator,
    counters: Counters,
}

impl Predictor {
    pub fn new(
        version: impl Into<String>,
        pipeline: Box<dyn Pipeline>,
        config: Config,
    ) -> Result<Self, ConfigError> {
        let validator = InputValidator::from_config(&config)?;
        Ok(Self {
            version: version.into(),
            pipeline,
            config,
            validator,
            counters: Counters::default(),
        })
    }

    /// Load the pipeline named by convention and build the predictor
    pub fn from_config(config: Config, loader: &PipelineLoader) -> Result<Self, LoadError> {
        config.validate()?;
        let pipeline = loader.load(&config)?;
        Ok(Self::new(loader.version(), pipeline, config)?)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline_metadata(&self) -> &PipelineMetadata {
        self.pipeline.metadata()
    }

    /// Validate the input, then predict with the pipeline
    pub fn make_prediction<I: Into<PredictionInput>>(&self, input: I) -> PredictionResult {
        let start = Instant::now();
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        let frame = match input.into() {
            PredictionInput::Frame(frame) => frame,
            PredictionInput::Json(value) => match Frame::from_json(&value) {
                Ok(frame) => frame,
                Err(e) => {
                    let issue =
                        ValidationIssue::new(vec!["inputs".into()], e.to_string(), "value_error.shape");
                    return self.reject(errors_to_json(&[issue]), start);
                }
            },
        };

        let (validated, errors) = self.validator.validate_inputs(frame);
        if let Some(errors) = errors {
            return self.reject(errors, start);
        }

        let selected = validated.select(self.validator.features());
        let raw = match self.pipeline.predict(&selected) {
            Ok(raw) if raw.len() == selected.len() => raw,
            Ok(raw) => {
                let e = PipelineError::Shape(format!(
                    "expected {} predictions, got {}",
                    selected.len(),
                    raw.len()
                ));
                return self.pipeline_failure(e, start);
            }
            Err(e) => return self.pipeline_failure(e, start),
        };

        let transform = self.config.model_config.output_transform;
        let predictions: Vec<f64> = raw.into_iter().map(|x| transform.apply(x)).collect();

        self.counters
            .rows_predicted
            .fetch_add(predictions.len() as u64, Ordering::Relaxed);
        self.track_latency(start);
        log::debug!(
            "Predicted {} rows with {} v{}",
            predictions.len(),
            self.config.app_config.package_name,
            self.version
        );

        PredictionResult {
            predictions: Some(predictions),
            version: self.version.clone(),
            errors: None,
        }
    }

    fn pipeline_failure(&self, error: PipelineError, start: Instant) -> PredictionResult {
        let issue = ValidationIssue::new(vec!["pipeline".into()], error.to_string(), "pipeline_error");
        self.reject(errors_to_json(&[issue]), start)
    }

    fn reject(&self, errors: String, start: Instant) -> PredictionResult {
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        self.track_latency(start);
        log::warn!(
            "Rejected prediction request for {}",
            self.config.app_config.package_name
        );

        PredictionResult {
            predictions: None,
            version: self.version.clone(),
            errors: Some(errors),
        }
    }

    fn track_latency(&self, start: Instant) {
        self.counters
            .latency_sum_us
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
    }

    pub fn status(&self) -> PredictorStatus {
        let meta = self.pipeline.metadata();
        let sum = self.counters.latency_sum_us.load(Ordering::Relaxed);
        let count = self.counters.requests.load(Ordering::Relaxed);
        let avg = if count > 0 { (sum as f32 / count as f32) / 1000.0 } else { 0.0 };

        PredictorStatus {
            package_name: self.config.app_config.package_name.clone(),
            version: self.version.clone(),
            pipeline_name: meta.name.clone(),
            pipeline_path: meta.path.clone(),
            pipeline_format: meta.format,
            feature_count: meta.feature_count,
            requests: count,
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            rows_predicted: self.counters.rows_predicted.load(Ordering::Relaxed),
            avg_latency_ms: avg,
        }
    }
}
