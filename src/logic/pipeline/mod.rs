//! Pipeline Module - Trained pipeline loading
//!
//! A pipeline is an externally trained transform-and-predict object. It is
//! loaded once at startup, owned by the predictor and never mutated.
//!
//! File naming convention: `{pipeline_save_file}{version}.{ext}` inside the
//! trained model directory.

pub mod artifact;
pub mod checksum;
#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::config::{Config, PipelineFormat};
use super::data::Frame;
use crate::constants;

pub use artifact::{Estimator, NativePipeline, PipelineArtifact, TransformStep};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read pipeline {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pipeline artefact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("checksum sidecar missing for {0}")]
    ChecksumMissing(PathBuf),

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("feature layout mismatch: expected {expected:08x}, got {actual:08x}")]
    LayoutMismatch { expected: u32, actual: u32 },

    #[error("feature {feature:?} row {row}: {reason}")]
    InvalidValue {
        feature: String,
        row: usize,
        reason: String,
    },

    #[error("shape error: {0}")]
    Shape(String),

    #[error("unsupported pipeline format: {0}")]
    UnsupportedFormat(String),

    #[error("onnx runtime: {0}")]
    Runtime(String),
}

// ============================================================================
// PIPELINE TRAIT
// ============================================================================

/// Loaded pipeline metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub path: String,
    pub format: PipelineFormat,
    pub name: String,
    pub version: String,
    pub feature_count: usize,
    pub sha256: String,
    pub loaded_at: chrono::DateTime<chrono::Utc>,
}

/// Transform-and-predict over a frame of selected features.
/// Returns one raw output per row.
pub trait Pipeline: Send + Sync {
    fn predict(&self, frame: &Frame) -> Result<Vec<f64>, PipelineError>;
    fn metadata(&self) -> &PipelineMetadata;
}

// ============================================================================
// LOADER
// ============================================================================

/// Resolves and loads the pipeline file for a config
#[derive(Debug, Clone)]
pub struct PipelineLoader {
    model_dir: PathBuf,
    version: String,
    require_checksum: bool,
}

impl PipelineLoader {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            version: constants::PACKAGE_VERSION.to_string(),
            require_checksum: false,
        }
    }

    /// Directory and checksum policy from the environment
    pub fn from_env() -> Self {
        Self::new(constants::get_trained_model_dir())
            .require_checksum(constants::is_checksum_required())
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn require_checksum(mut self, required: bool) -> Self {
        self.require_checksum = required;
        self
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn pipeline_path(&self, config: &Config) -> PathBuf {
        self.model_dir.join(config.pipeline_file_name(&self.version))
    }

    /// Load the pipeline named by convention; failures are fatal at startup
    pub fn load(&self, config: &Config) -> Result<Box<dyn Pipeline>, PipelineError> {
        let path = self.pipeline_path(config);
        log::info!("Loading pipeline from: {}", path.display());

        if !path.exists() {
            return Err(PipelineError::NotFound(path));
        }

        let sha256 = checksum::verify_sidecar(&path, self.require_checksum)?;

        let pipeline: Box<dyn Pipeline> = match config.app_config.pipeline_format {
            PipelineFormat::Json => Box::new(NativePipeline::load(&path, config, sha256)?),
            #[cfg(feature = "onnx")]
            PipelineFormat::Onnx => Box::new(onnx::OnnxPipeline::load(&path, config, sha256)?),
            #[cfg(not(feature = "onnx"))]
            PipelineFormat::Onnx => {
                return Err(PipelineError::UnsupportedFormat(
                    "onnx (build with --features onnx)".to_string(),
                ))
            }
        };

        let meta = pipeline.metadata();
        log::info!(
            "Pipeline {} v{} loaded ({} features)",
            meta.name,
            meta.version,
            meta.feature_count
        );
        Ok(pipeline)
    }
}
