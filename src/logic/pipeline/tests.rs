//! Pipeline loading and native artefact tests

use std::path::Path;

use serde_json::json;

use super::{Pipeline, PipelineArtifact, PipelineError, PipelineLoader, NativePipeline};
use crate::constants::PACKAGE_VERSION;
use crate::logic::config::{Config, PipelineFormat};
use crate::logic::data::Frame;
use crate::logic::schema::feature_layout_hash;

fn titanic_artifact(config: &Config) -> serde_json::Value {
    json!({
        "name": "cls_model",
        "version": PACKAGE_VERSION,
        "features": config.model_config.features,
        "schema_hash": feature_layout_hash(&config.model_config.features),
        "steps": [
            {"type": "fill_categorical", "values": {"sex": "missing"}},
            {"type": "map", "variable": "sex", "mapping": {"male": 0.0, "female": 1.0}, "unseen": 0.0}
        ],
        "estimator": {"type": "logistic", "intercept": -2.0, "coefficients": {"sex": 4.0}}
    })
}

fn house_artifact() -> PipelineArtifact {
    serde_json::from_value(json!({
        "name": "regression_model",
        "features": ["LotFrontage", "OverallQual", "YearRemodAdd", "YrSold", "GrLivArea"],
        "steps": [
            {"type": "missing_indicator", "variables": ["LotFrontage"]},
            {"type": "fill_numeric", "values": {"LotFrontage": 69.0}},
            {"type": "elapsed_time", "variables": ["YearRemodAdd"], "reference": "YrSold"},
            {"type": "drop", "variables": ["YrSold"]},
            {"type": "log", "variables": ["GrLivArea"]}
        ],
        "estimator": {
            "type": "linear",
            "intercept": 11.0,
            "coefficients": {"OverallQual": 0.1, "LotFrontage_na": 0.5, "YearRemodAdd": 0.01}
        }
    }))
    .unwrap()
}

fn write_artifact(dir: &Path, config: &Config, artifact: &serde_json::Value) -> std::path::PathBuf {
    let path = dir.join(config.pipeline_file_name(PACKAGE_VERSION));
    std::fs::write(&path, serde_json::to_string_pretty(artifact).unwrap()).unwrap();
    path
}

#[test]
fn test_loader_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::titanic().unwrap();

    let result = PipelineLoader::new(dir.path()).load(&config);
    assert!(matches!(result, Err(PipelineError::NotFound(_))));
}

#[test]
fn test_loader_resolves_versioned_path() {
    let config = Config::house_prices().unwrap();
    let loader = PipelineLoader::new("/models").with_version("1.2.3");

    assert_eq!(
        loader.pipeline_path(&config),
        Path::new("/models/regression_model_output_v1.2.3.json")
    );
}

#[test]
fn test_load_native_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::titanic().unwrap();
    write_artifact(dir.path(), &config, &titanic_artifact(&config));

    let pipeline = PipelineLoader::new(dir.path()).load(&config).unwrap();
    let meta = pipeline.metadata();
    assert_eq!(meta.name, "cls_model");
    assert_eq!(meta.version, PACKAGE_VERSION);
    assert_eq!(meta.feature_count, 9);
    assert_eq!(meta.sha256.len(), 64);
}

#[test]
fn test_layout_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::titanic().unwrap();
    let mut artifact = titanic_artifact(&config);
    artifact["schema_hash"] = json!(feature_layout_hash(&["other".to_string()]));
    write_artifact(dir.path(), &config, &artifact);

    let result = PipelineLoader::new(dir.path()).load(&config);
    assert!(matches!(result, Err(PipelineError::LayoutMismatch { .. })));
}

#[test]
fn test_malformed_artifact_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::titanic().unwrap();
    write_artifact(dir.path(), &config, &json!({"name": "cls_model"}));

    let result = PipelineLoader::new(dir.path()).load(&config);
    assert!(matches!(result, Err(PipelineError::Parse(_))));
}

#[test]
fn test_required_checksum_without_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::titanic().unwrap();
    write_artifact(dir.path(), &config, &titanic_artifact(&config));

    let result = PipelineLoader::new(dir.path())
        .require_checksum(true)
        .load(&config);
    assert!(matches!(result, Err(PipelineError::ChecksumMissing(_))));
}

#[cfg(not(feature = "onnx"))]
#[test]
fn test_onnx_requires_feature() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::titanic().unwrap();
    config.app_config.pipeline_format = PipelineFormat::Onnx;
    let path = dir.path().join(config.pipeline_file_name(PACKAGE_VERSION));
    std::fs::write(&path, b"not a graph").unwrap();

    let result = PipelineLoader::new(dir.path()).load(&config);
    assert!(matches!(result, Err(PipelineError::UnsupportedFormat(_))));
}

#[test]
fn test_logistic_outputs_labels() {
    let config = Config::titanic().unwrap();
    let artifact: PipelineArtifact = serde_json::from_value(titanic_artifact(&config)).unwrap();
    let pipeline = NativePipeline::from_artifact(artifact);

    let frame = Frame::from_json(&json!([
        {"sex": "male"},
        {"sex": "female"},
        {"sex": null}
    ]))
    .unwrap();

    assert_eq!(pipeline.predict(&frame).unwrap(), vec![0.0, 1.0, 0.0]);
    assert_eq!(pipeline.metadata().format, PipelineFormat::Json);
}

#[test]
fn test_linear_pipeline_steps() {
    let pipeline = NativePipeline::from_artifact(house_artifact());
    let frame = Frame::from_json(&json!([
        {"LotFrontage": 80.0, "OverallQual": 5, "YearRemodAdd": 2000, "YrSold": 2010, "GrLivArea": 896},
        {"LotFrontage": null, "OverallQual": 7, "YearRemodAdd": 2010, "YrSold": 2010, "GrLivArea": 1200}
    ]))
    .unwrap();

    let predictions = pipeline.predict(&frame).unwrap();
    assert_eq!(predictions.len(), 2);
    assert!((predictions[0] - (11.0 + 0.5 + 0.1)).abs() < 1e-9);
    assert!((predictions[1] - (11.0 + 0.7 + 0.5)).abs() < 1e-9);
}

#[test]
fn test_log_of_non_positive_value_fails() {
    let pipeline = NativePipeline::from_artifact(house_artifact());
    let frame = Frame::from_json(&json!([
        {"LotFrontage": 80.0, "OverallQual": 5, "YearRemodAdd": 2000, "YrSold": 2010, "GrLivArea": 0}
    ]))
    .unwrap();

    match pipeline.predict(&frame) {
        Err(PipelineError::InvalidValue { feature, row, .. }) => {
            assert_eq!(feature, "GrLivArea");
            assert_eq!(row, 0);
        }
        other => panic!("expected InvalidValue, got {other:?}"),
    }
}

#[test]
fn test_missing_column_is_shape_error() {
    let pipeline = NativePipeline::from_artifact(house_artifact());
    let frame = Frame::from_json(&json!([{"OverallQual": 5}])).unwrap();

    assert!(matches!(pipeline.predict(&frame), Err(PipelineError::Shape(_))));
}

#[test]
fn test_rare_labels_and_unmapped() {
    let artifact: PipelineArtifact = serde_json::from_value(json!({
        "name": "rare",
        "features": ["zone"],
        "steps": [
            {"type": "rare_labels", "frequent": {"zone": ["RL", "RM"]}},
            {"type": "map", "variable": "zone", "mapping": {"RL": 1.0, "RM": 2.0, "Rare": 3.0}}
        ],
        "estimator": {"type": "linear", "intercept": 0.0, "coefficients": {"zone": 1.0}}
    }))
    .unwrap();
    let pipeline = NativePipeline::from_artifact(artifact);

    let frame = Frame::from_json(&json!({"zone": ["RL", "FV", "RM"]})).unwrap();
    assert_eq!(pipeline.predict(&frame).unwrap(), vec![1.0, 3.0, 2.0]);

    // Missing labels are not rare; with no `unseen` fallback the map fails
    let frame = Frame::from_json(&json!([{"zone": null}])).unwrap();
    assert!(matches!(
        pipeline.predict(&frame),
        Err(PipelineError::InvalidValue { .. })
    ));
}

#[test]
fn test_empty_frame_predicts_nothing() {
    let pipeline = NativePipeline::from_artifact(house_artifact());
    let frame = Frame::new(vec![
        "LotFrontage".into(),
        "OverallQual".into(),
        "YearRemodAdd".into(),
        "YrSold".into(),
        "GrLivArea".into(),
    ]);

    assert!(pipeline.predict(&frame).unwrap().is_empty());
}
