//! Manifest serialization
//!
//! The manifest is the human-readable half of the artifact pair: a pretty
//! JSON document naming the blob, its verified size, and the nested tensor
//! index. It is written exactly once, only after the blob has passed the
//! size check; a failed conversion leaves no manifest behind.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::blob::{verify_blob_size, BlobFile};
use crate::error::{Result, VolcarError};
use crate::index::ModelIndex;

/// Description of a finished blob/index artifact pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Blob location, stored exactly as given at conversion time
    pub file_path: String,
    /// Verified blob size in bytes
    pub file_size: u64,
    /// Nested tensor index
    pub model_index: ModelIndex,
}

impl Manifest {
    /// Serialize the manifest as pretty JSON to `path`
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| VolcarError::FormatError {
            reason: format!("serialize manifest: {e}"),
        })?;
        std::fs::write(path, json).map_err(|e| VolcarError::IoError {
            message: format!("write {}: {e}", path.display()),
        })
    }

    /// Load a manifest from a JSON file
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be read and `FormatError` if
    /// the JSON does not parse as a manifest.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| VolcarError::IoError {
            message: format!("read {}: {e}", path.display()),
        })?;
        serde_json::from_str(&content).map_err(|e| VolcarError::FormatError {
            reason: format!("parse {}: {e}", path.display()),
        })
    }

    /// Open the blob this manifest describes, re-verifying its size
    ///
    /// The `file_path` is resolved as-is, the same way it was given at
    /// conversion time.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the blob cannot be opened and
    /// `IntegrityError` if its size no longer matches `file_size`.
    pub fn open_blob(&self) -> Result<BlobFile> {
        let path = Path::new(&self.file_path);
        verify_blob_size(path, self.file_size)?;
        BlobFile::open(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::TensorRecord;
    use crate::route::route_name;
    use tempfile::tempdir;

    fn sample_manifest() -> Manifest {
        let mut index = ModelIndex::new(2);
        index
            .insert(
                &route_name("model/wpe").unwrap(),
                TensorRecord {
                    pos: 0,
                    size: 6,
                    shape: vec![2, 3],
                },
            )
            .unwrap();
        index
            .insert(
                &route_name("model/h1/attn/c_attn/w").unwrap(),
                TensorRecord {
                    pos: 24,
                    size: 4,
                    shape: vec![2, 2],
                },
            )
            .unwrap();
        Manifest {
            file_path: "model_file.data".to_string(),
            file_size: 40,
            model_index: index,
        }
    }

    #[test]
    fn test_write_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model_index.json");
        let manifest = sample_manifest();
        manifest.write(&path).unwrap();

        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_written_json_is_pretty_with_expected_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model_index.json");
        sample_manifest().write(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["file_path"], "model_file.data");
        assert_eq!(value["file_size"], 40);
        assert_eq!(value["model_index"]["wpe"]["pos"], 0);
        assert_eq!(
            value["model_index"]["blocks"][1]["attn"]["c_attn"]["w"]["size"],
            4
        );
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = Manifest::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, VolcarError::IoError { .. }));
    }

    #[test]
    fn test_load_malformed_json_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{").unwrap();
        let err = Manifest::load(&path).unwrap_err();
        assert!(matches!(err, VolcarError::FormatError { .. }));
    }

    #[test]
    fn test_open_blob_checks_size() {
        let dir = tempdir().unwrap();
        let blob_path = dir.path().join("blob.data");
        std::fs::write(&blob_path, [0u8; 12]).unwrap();

        let mut manifest = sample_manifest();
        manifest.file_path = blob_path.to_string_lossy().into_owned();
        manifest.file_size = 12;
        assert!(manifest.open_blob().is_ok());

        manifest.file_size = 13;
        let err = manifest.open_blob().unwrap_err();
        assert!(matches!(err, VolcarError::IntegrityError { .. }));
    }
}
