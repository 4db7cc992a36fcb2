//! Logic Module - Prediction Engine
//!
//! - `config/` - Package and model configuration (features, schema, NA groupings)
//! - `data/` - Tabular input frames (JSON records, column mappings, CSV)
//! - `schema/` - Typed input schema and feature layout hash
//! - `validation/` - Pre-pipeline preparation, NA filtering, schema checks
//! - `pipeline/` - Trained pipeline loading (native artefact, optional ONNX)
//! - `predict/` - Predictor orchestration and result formatting

pub mod config;
pub mod data;
pub mod schema;
pub mod validation;
pub mod pipeline;
pub mod predict;
