//! Feature Layout Hash
//!
//! CRC32 over the ordered feature list. A pipeline artefact may carry the
//! hash of the layout it was trained on; a mismatch means the configured
//! features and the pipeline disagree on column order or names.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

/// Compute CRC32 hash of an ordered feature list
pub fn feature_layout_hash(features: &[String]) -> u32 {
    let mut hasher = Hasher::new();
    for name in features {
        hasher.update(name.as_bytes());
        hasher.update(&[0]); // Separator
    }
    hasher.finalize()
}

/// Layout summary for status output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn from_features(features: &[String]) -> Self {
        Self {
            hash: feature_layout_hash(features),
            feature_count: features.len(),
            feature_names: features.to_vec(),
        }
    }
}
