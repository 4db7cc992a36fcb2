//! Package Configuration
//!
//! Feature lists, NA groupings, preparation steps, schema and file naming for
//! one prediction service. Loaded once per process from YAML or TOML.
//!
//! Both packaged variants ship as bundled YAML files under `config/`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::schema::InputSchema;

const HOUSE_PRICES_YAML: &str = include_str!("../../config/house_prices.yml");
const TITANIC_YAML: &str = include_str!("../../config/titanic.yml");

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown variant {0:?} (expected house-prices or titanic)")]
    UnknownVariant(String),
}

// ============================================================================
// VARIANT
// ============================================================================

/// Packaged prediction service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Regression price model, predictions are exponentiated
    HousePrices,
    /// Titanic survival classifier
    Titanic,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HousePrices => "house-prices",
            Self::Titanic => "titanic",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "house-prices" | "regression" => Ok(Self::HousePrices),
            "titanic" | "classification" => Ok(Self::Titanic),
            other => Err(ConfigError::UnknownVariant(other.to_string())),
        }
    }
}

// ============================================================================
// CONFIG SECTIONS
// ============================================================================

/// Serialization format of the trained pipeline file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineFormat {
    /// Native JSON pipeline artefact
    #[default]
    Json,
    /// ONNX graph (requires the `onnx` feature)
    Onnx,
}

impl PipelineFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Onnx => "onnx",
        }
    }
}

/// Inverse transform applied to raw pipeline output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTransform {
    #[default]
    Identity,
    /// Target was log-transformed at training time
    Exp,
}

impl OutputTransform {
    pub fn apply(&self, raw: f64) -> f64 {
        match self {
            Self::Identity => raw,
            Self::Exp => raw.exp(),
        }
    }
}

/// Package-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub package_name: String,
    /// Pipeline file prefix; the version and extension are appended
    pub pipeline_save_file: String,
    #[serde(default)]
    pub pipeline_format: PipelineFormat,
    #[serde(default)]
    pub training_data_file: Option<String>,
    #[serde(default)]
    pub test_data_file: Option<String>,
}

/// Regex-based derived column (e.g. passenger title from name)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRule {
    pub source: String,
    pub target: String,
    /// Checked in order, first match wins
    pub patterns: Vec<String>,
    pub fallback: String,
}

/// Steps run before column selection, in declaration order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreparationConfig {
    /// Extra string markers treated as missing
    pub na_values: Vec<String>,
    /// Column renames (names that are not valid identifiers)
    pub rename: BTreeMap<String, String>,
    /// Keep only the first whitespace token
    pub first_token: Vec<String>,
    pub extract: Vec<ExtractRule>,
    pub cast_float: Vec<String>,
    pub drop: Vec<String>,
}

/// Model-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub target: String,
    pub features: Vec<String>,
    #[serde(default)]
    pub categorical_vars_with_na_frequent: Vec<String>,
    #[serde(default)]
    pub categorical_vars_with_na_missing: Vec<String>,
    #[serde(default)]
    pub numerical_vars_with_na: Vec<String>,
    /// Drop rows with nulls in features outside the NA groupings
    #[serde(default)]
    pub drop_na_rows: bool,
    #[serde(default)]
    pub output_transform: OutputTransform,
    #[serde(default)]
    pub preparation: PreparationConfig,
    pub schema: InputSchema,
}

impl ModelConfig {
    /// Features allowed to carry nulls
    pub fn vars_with_na(&self) -> Vec<&str> {
        self.categorical_vars_with_na_frequent
            .iter()
            .chain(&self.categorical_vars_with_na_missing)
            .chain(&self.numerical_vars_with_na)
            .map(String::as_str)
            .collect()
    }
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app_config: AppConfig,
    pub model_config: ModelConfig,
}

impl Config {
    /// Bundled configuration for a packaged variant
    pub fn for_variant(variant: Variant) -> Result<Self, ConfigError> {
        match variant {
            Variant::HousePrices => Self::from_yaml(HOUSE_PRICES_YAML),
            Variant::Titanic => Self::from_yaml(TITANIC_YAML),
        }
    }

    pub fn house_prices() -> Result<Self, ConfigError> {
        Self::for_variant(Variant::HousePrices)
    }

    pub fn titanic() -> Result<Self, ConfigError> {
        Self::for_variant(Variant::Titanic)
    }

    /// Load configuration from a file (YAML or TOML, auto-detected by extension)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let config = match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml(&content)?,
            "toml" => Self::from_toml(&content)?,
            _ => Self::from_yaml(&content).or_else(|_| Self::from_toml(&content))?,
        };

        log::info!(
            "Loaded config for {} from {}",
            config.app_config.package_name,
            path.display()
        );
        Ok(config)
    }

    /// Parse and check configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and check configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Cross-field checks that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_config.pipeline_save_file.trim().is_empty() {
            return Err(ConfigError::Invalid("pipeline_save_file is empty".into()));
        }

        let model = &self.model_config;
        if model.features.is_empty() {
            return Err(ConfigError::Invalid("features list is empty".into()));
        }

        if let Some(unknown) = model
            .vars_with_na()
            .into_iter()
            .find(|var| !model.features.iter().any(|f| f == var))
        {
            return Err(ConfigError::Invalid(format!(
                "NA grouping references unknown feature {unknown:?}"
            )));
        }

        if model.features.iter().any(|f| f == &model.target) {
            return Err(ConfigError::Invalid(format!(
                "target {:?} is listed as a feature",
                model.target
            )));
        }

        Ok(())
    }

    /// Pipeline file name by convention: `{prefix}{version}.{ext}`
    pub fn pipeline_file_name(&self, version: &str) -> String {
        format!(
            "{}{}.{}",
            self.app_config.pipeline_save_file,
            version,
            self.app_config.pipeline_format.extension()
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
