//! Central Configuration Constants
//!
//! Single source of truth for runtime defaults.
//! Every value can be overridden through the environment (or a `.env` file).

use std::path::PathBuf;

/// Package version, used as the pipeline version tag
pub const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "model-package";

/// Directory name for trained pipelines under the data dir
pub const TRAINED_MODEL_DIR_NAME: &str = "trained_models";

/// Directory name for datasets under the data dir
pub const DATASET_DIR_NAME: &str = "datasets";

/// Env var: trained pipeline directory
pub const ENV_TRAINED_MODEL_DIR: &str = "MODEL_PACKAGE_TRAINED_MODEL_DIR";

/// Env var: dataset directory
pub const ENV_DATASET_DIR: &str = "MODEL_PACKAGE_DATASET_DIR";

/// Env var: config file override
pub const ENV_CONFIG: &str = "MODEL_PACKAGE_CONFIG";

/// Env var: refuse pipelines without a checksum sidecar
pub const ENV_REQUIRE_CHECKSUM: &str = "MODEL_PACKAGE_REQUIRE_CHECKSUM";

// ============================================
// Helper functions to read from env with fallback
// ============================================

fn data_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Get the trained pipeline directory from environment or use default
pub fn get_trained_model_dir() -> PathBuf {
    std::env::var(ENV_TRAINED_MODEL_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_root().join(TRAINED_MODEL_DIR_NAME))
}

/// Get the dataset directory from environment or use default
pub fn get_dataset_dir() -> PathBuf {
    std::env::var(ENV_DATASET_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_root().join(DATASET_DIR_NAME))
}

/// Get the config file override, if any
pub fn get_config_path() -> Option<PathBuf> {
    std::env::var(ENV_CONFIG).ok().map(PathBuf::from)
}

/// Check if a checksum sidecar is mandatory for pipeline files
pub fn is_checksum_required() -> bool {
    std::env::var(ENV_REQUIRE_CHECKSUM)
        .map(|s| s.to_lowercase() == "true" || s == "1")
        .unwrap_or(false)
}
