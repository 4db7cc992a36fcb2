//! Model Package - validated prediction services
//!
//! Two prediction services share this crate: a regression price model
//! (house prices) and a Titanic survival classifier. Both wrap a pre-trained
//! pipeline loaded from disk with input validation and a predict-and-format API.
//!
//! ```text
//! Config ──► PipelineLoader ──► Pipeline
//!   │                              │
//!   └──► InputValidator ──► Predictor::make_prediction ──► PredictionResult
//! ```

pub mod constants;
pub mod logic;

pub use logic::config::{Config, Variant};
pub use logic::data::{Frame, Value};
pub use logic::pipeline::{Pipeline, PipelineError, PipelineLoader};
pub use logic::predict::{PredictionInput, PredictionResult, Predictor};
