//! Pipeline Checksum
//!
//! A pipeline file may ship with a `{file}.sha256` sidecar (sha256sum format:
//! digest first, optional file name after).

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::PipelineError;

/// Compute the SHA-256 of a file as lowercase hex
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

/// Hash the file and compare it with its sidecar when present.
/// Returns the computed digest.
pub fn verify_sidecar(path: &Path, required: bool) -> Result<String, PipelineError> {
    let actual = sha256_file(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let sidecar = sidecar_path(path);
    if !sidecar.exists() {
        if required {
            return Err(PipelineError::ChecksumMissing(path.to_path_buf()));
        }
        log::debug!("No checksum sidecar for {}", path.display());
        return Ok(actual);
    }

    let content = std::fs::read_to_string(&sidecar).map_err(|source| PipelineError::Io {
        path: sidecar.clone(),
        source,
    })?;
    let expected = content
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();

    if expected != actual {
        return Err(PipelineError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }

    log::info!("Checksum verified for {}", path.display());
    Ok(actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.json");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sidecar_match_and_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"abc").unwrap();

        std::fs::write(
            sidecar_path(&path),
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD  model.json\n",
        )
        .unwrap();
        assert!(verify_sidecar(&path, true).is_ok());

        std::fs::write(sidecar_path(&path), "deadbeef\n").unwrap();
        assert!(matches!(
            verify_sidecar(&path, false),
            Err(PipelineError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"{}").unwrap();

        assert!(verify_sidecar(&path, false).is_ok());
        assert!(matches!(
            verify_sidecar(&path, true),
            Err(PipelineError::ChecksumMissing(_))
        ));
    }
}
