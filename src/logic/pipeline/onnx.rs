//! ONNX Pipeline - exported pipelines run through onnxruntime
//!
//! The graph takes a single `[rows, features]` f32 tensor in config feature
//! order and returns one value per row. Categorical encoding must be part of
//! the exported graph; string cells are rejected here.

use std::path::Path;

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value as OrtValue;
use parking_lot::Mutex;

use super::{Pipeline, PipelineError, PipelineMetadata};
use crate::constants::PACKAGE_VERSION;
use crate::logic::config::{Config, PipelineFormat};
use crate::logic::data::{Frame, Value};

pub struct OnnxPipeline {
    session: Mutex<Session>,
    features: Vec<String>,
    metadata: PipelineMetadata,
}

impl OnnxPipeline {
    pub fn load(path: &Path, config: &Config, sha256: String) -> Result<Self, PipelineError> {
        let session = Session::builder()
            .map_err(|e| PipelineError::Runtime(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| PipelineError::Runtime(format!("Failed to set optimization: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| PipelineError::Runtime(format!("Failed to load model: {}", e)))?;

        let features = config.model_config.features.clone();
        let metadata = PipelineMetadata {
            path: path.display().to_string(),
            format: PipelineFormat::Onnx,
            name: config.app_config.package_name.clone(),
            version: PACKAGE_VERSION.to_string(),
            feature_count: features.len(),
            sha256,
            loaded_at: chrono::Utc::now(),
        };

        Ok(Self {
            session: Mutex::new(session),
            features,
            metadata,
        })
    }

    fn input_matrix(&self, frame: &Frame) -> Result<Array2<f32>, PipelineError> {
        let mut data = Vec::with_capacity(frame.len() * self.features.len());
        for row in 0..frame.len() {
            for feature in &self.features {
                let cell = frame.get(row, feature);
                let x = match cell {
                    v if v.is_null() => f32::NAN,
                    Value::Str(_) | Value::Nested(_) => {
                        return Err(PipelineError::InvalidValue {
                            feature: feature.clone(),
                            row,
                            reason: format!("{} value in numeric tensor", cell.type_name()),
                        })
                    }
                    other => other.as_f64().unwrap_or(f64::NAN) as f32,
                };
                data.push(x);
            }
        }

        Array2::from_shape_vec((frame.len(), self.features.len()), data)
            .map_err(|e| PipelineError::Shape(e.to_string()))
    }
}

impl Pipeline for OnnxPipeline {
    fn predict(&self, frame: &Frame) -> Result<Vec<f64>, PipelineError> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }

        let input_array = self.input_matrix(frame)?;
        let mut session = self.session.lock();

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| PipelineError::Runtime("No output defined".to_string()))?;

        let input_tensor = OrtValue::from_array(input_array)
            .map_err(|e| PipelineError::Runtime(format!("Tensor error: {}", e)))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| PipelineError::Runtime(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get(&output_name)
            .ok_or_else(|| PipelineError::Runtime("No output".to_string()))?;

        let output_tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::Runtime(format!("Extract error: {}", e)))?;

        let data = output_tensor.1;
        if data.len() != frame.len() {
            return Err(PipelineError::Shape(format!(
                "expected {} outputs, got {}",
                frame.len(),
                data.len()
            )));
        }

        Ok(data.iter().map(|&x| x as f64).collect())
    }

    fn metadata(&self) -> &PipelineMetadata {
        &self.metadata
    }
}
