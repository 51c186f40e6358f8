//! Conversion driver
//!
//! Streams a checkpoint's variables through the pipeline one at a time:
//! squeeze the shape, route the name, append the values to the blob,
//! insert the index record at the routed location. After the loop the
//! blob's size is verified against the byte cursor and only then is the
//! manifest written. Any failure along the way aborts with no manifest
//! on disk.

use std::path::Path;

use crate::blob::BlobWriter;
use crate::checkpoint::CheckpointReader;
use crate::error::Result;
use crate::index::{ModelIndex, TensorRecord};
use crate::manifest::Manifest;
use crate::route::route_name;

/// One converted tensor, as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSummary {
    /// Variable name as stored in the checkpoint
    pub name: String,
    /// Shape after singleton removal
    pub shape: Vec<usize>,
    /// Element count
    pub size: u64,
}

/// Outcome of a completed conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    /// Per-tensor summaries in processing order
    pub tensors: Vec<TensorSummary>,
    /// Verified blob size in bytes
    pub blob_bytes: u64,
}

impl ConversionReport {
    /// Number of tensors converted
    #[must_use]
    pub fn tensor_count(&self) -> usize {
        self.tensors.len()
    }
}

/// Convert a checkpoint into a blob/manifest artifact pair
///
/// `blob_path` is stored in the manifest exactly as given, so the same
/// string resolves the blob when the manifest is read back. The index has
/// `n_layer` layer blocks.
///
/// # Errors
///
/// Returns `FormatError` for names that do not fit the expected layout,
/// `IoError` for storage failures, and `IntegrityError` if the written
/// blob's size disagrees with the byte cursor. On any error the manifest
/// is not written.
pub fn convert_checkpoint(
    reader: &impl CheckpointReader,
    n_layer: usize,
    blob_path: &Path,
    manifest_path: &Path,
) -> Result<ConversionReport> {
    convert_checkpoint_with(reader, n_layer, blob_path, manifest_path, |_| {})
}

/// [`convert_checkpoint`] with a per-tensor observer
///
/// The observer runs after each tensor is written, letting the CLI print
/// the stream as it happens.
///
/// # Errors
///
/// Same as [`convert_checkpoint`].
pub fn convert_checkpoint_with(
    reader: &impl CheckpointReader,
    n_layer: usize,
    blob_path: &Path,
    manifest_path: &Path,
    mut observer: impl FnMut(&TensorSummary),
) -> Result<ConversionReport> {
    let mut index = ModelIndex::new(n_layer);
    let mut writer = BlobWriter::create(blob_path)?;
    let mut tensors = Vec::new();

    for name in reader.variable_names() {
        let variable = reader.load_variable(&name)?;
        let route = route_name(variable.name())?;
        let shape = variable.squeezed_shape();
        let size = variable.size() as u64;

        let pos = writer.append(variable.data())?;
        index.insert(
            &route,
            TensorRecord {
                pos,
                size,
                shape: shape.clone(),
            },
        )?;

        let summary = TensorSummary { name, shape, size };
        observer(&summary);
        tensors.push(summary);
    }

    // Closes the file and checks the cursor against the size on disk
    let blob_bytes = writer.finish()?;

    let manifest = Manifest {
        file_path: blob_path.to_string_lossy().into_owned(),
        file_size: blob_bytes,
        model_index: index,
    };
    manifest.write(manifest_path)?;

    Ok(ConversionReport {
        tensors,
        blob_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VolcarError;
    use crate::variable::Variable;
    use tempfile::tempdir;

    /// In-memory reader yielding variables in insertion order
    struct FakeCheckpoint {
        variables: Vec<Variable>,
    }

    impl FakeCheckpoint {
        fn new(variables: Vec<Variable>) -> Self {
            Self { variables }
        }
    }

    impl CheckpointReader for FakeCheckpoint {
        fn variable_names(&self) -> Vec<String> {
            self.variables.iter().map(|v| v.name().to_string()).collect()
        }

        fn load_variable(&self, name: &str) -> Result<Variable> {
            self.variables
                .iter()
                .find(|v| v.name() == name)
                .cloned()
                .ok_or_else(|| VolcarError::FormatError {
                    reason: format!("tensor {name:?} not found"),
                })
        }
    }

    fn variable(name: &str, shape: &[usize], fill: f32) -> Variable {
        let count: usize = shape.iter().product();
        Variable::new(name, shape.to_vec(), vec![fill; count]).unwrap()
    }

    #[test]
    fn test_convert_small_checkpoint() {
        let dir = tempdir().unwrap();
        let blob_path = dir.path().join("model_file.data");
        let manifest_path = dir.path().join("model_index.json");

        let reader = FakeCheckpoint::new(vec![
            variable("model/h0/attn/c_attn/w", &[1, 4, 12], 0.5),
            variable("model/ln_f/g", &[4], 1.0),
            variable("model/wpe", &[8, 4], 2.0),
        ]);

        let report = convert_checkpoint(&reader, 2, &blob_path, &manifest_path).unwrap();
        assert_eq!(report.tensor_count(), 3);
        assert_eq!(report.blob_bytes, 4 * (48 + 4 + 32));

        let manifest = Manifest::load(&manifest_path).unwrap();
        assert_eq!(manifest.file_size, report.blob_bytes);
        assert_eq!(manifest.model_index.n_blocks(), 2);

        // Positions follow processing order
        let w = manifest
            .model_index
            .block_record(0, &["attn", "c_attn", "w"])
            .unwrap();
        assert_eq!(w.pos, 0);
        assert_eq!(w.size, 48);
        assert_eq!(w.shape, vec![4, 12]); // singleton dim squeezed

        let g = manifest.model_index.record(&["ln_f", "g"]).unwrap();
        assert_eq!(g.pos, 192);

        let wpe = manifest.model_index.record(&["wpe"]).unwrap();
        assert_eq!(wpe.pos, 208);
        assert_eq!(wpe.shape, vec![8, 4]);
    }

    #[test]
    fn test_positions_are_prefix_sums() {
        let dir = tempdir().unwrap();
        let blob_path = dir.path().join("blob.data");
        let manifest_path = dir.path().join("index.json");

        let reader = FakeCheckpoint::new(vec![
            variable("model/a", &[3], 0.0),
            variable("model/b", &[5], 0.0),
            variable("model/c", &[2], 0.0),
        ]);

        let report = convert_checkpoint(&reader, 0, &blob_path, &manifest_path).unwrap();
        let manifest = Manifest::load(&manifest_path).unwrap();

        let mut expected_pos = 0u64;
        for summary in &report.tensors {
            let record = manifest
                .model_index
                .record(&[summary.name.trim_start_matches("model/")])
                .unwrap();
            assert_eq!(record.pos, expected_pos);
            expected_pos += 4 * record.size;
        }
        assert_eq!(expected_pos, report.blob_bytes);
    }

    #[test]
    fn test_observer_sees_each_tensor_in_order() {
        let dir = tempdir().unwrap();
        let reader = FakeCheckpoint::new(vec![
            variable("model/a", &[1], 0.0),
            variable("model/b", &[2], 0.0),
        ]);

        let mut seen = Vec::new();
        convert_checkpoint_with(
            &reader,
            0,
            &dir.path().join("blob.data"),
            &dir.path().join("index.json"),
            |summary| seen.push(summary.name.clone()),
        )
        .unwrap();
        assert_eq!(seen, vec!["model/a", "model/b"]);
    }

    #[test]
    fn test_bad_name_fails_without_manifest() {
        let dir = tempdir().unwrap();
        let manifest_path = dir.path().join("index.json");

        let reader = FakeCheckpoint::new(vec![
            variable("model/wpe", &[2], 0.0),
            variable("unprefixed", &[2], 0.0),
        ]);

        let err = convert_checkpoint(&reader, 0, &dir.path().join("blob.data"), &manifest_path)
            .unwrap_err();
        assert!(matches!(err, VolcarError::FormatError { .. }));
        assert!(!manifest_path.exists());
    }

    #[test]
    fn test_duplicate_name_fails_without_manifest() {
        let dir = tempdir().unwrap();
        let manifest_path = dir.path().join("index.json");

        let reader = FakeCheckpoint::new(vec![
            variable("model/wpe", &[2], 0.0),
            variable("model/wpe", &[2], 1.0),
        ]);

        let err = convert_checkpoint(&reader, 0, &dir.path().join("blob.data"), &manifest_path)
            .unwrap_err();
        assert!(matches!(err, VolcarError::FormatError { .. }));
        assert!(!manifest_path.exists());
    }

    #[test]
    fn test_reserved_blocks_name_fails_without_manifest() {
        let dir = tempdir().unwrap();
        let manifest_path = dir.path().join("index.json");

        let reader = FakeCheckpoint::new(vec![variable("model/blocks", &[2], 0.0)]);

        let err = convert_checkpoint(&reader, 1, &dir.path().join("blob.data"), &manifest_path)
            .unwrap_err();
        assert!(matches!(err, VolcarError::FormatError { .. }));
        assert!(!manifest_path.exists());
    }

    #[test]
    fn test_block_out_of_range_fails_without_manifest() {
        let dir = tempdir().unwrap();
        let manifest_path = dir.path().join("index.json");

        let reader = FakeCheckpoint::new(vec![variable("model/h5/w", &[2], 0.0)]);

        let err = convert_checkpoint(&reader, 2, &dir.path().join("blob.data"), &manifest_path)
            .unwrap_err();
        assert!(matches!(err, VolcarError::FormatError { .. }));
        assert!(!manifest_path.exists());
    }

    #[test]
    fn test_empty_checkpoint_yields_empty_artifacts() {
        let dir = tempdir().unwrap();
        let blob_path = dir.path().join("blob.data");
        let manifest_path = dir.path().join("index.json");

        let reader = FakeCheckpoint::new(vec![]);
        let report = convert_checkpoint(&reader, 1, &blob_path, &manifest_path).unwrap();
        assert_eq!(report.tensor_count(), 0);
        assert_eq!(report.blob_bytes, 0);

        let manifest = Manifest::load(&manifest_path).unwrap();
        assert_eq!(manifest.file_size, 0);
        assert_eq!(manifest.model_index.tensor_count(), 0);
    }

    #[test]
    fn test_rerun_is_byte_identical() {
        let dir = tempdir().unwrap();
        let reader = FakeCheckpoint::new(vec![
            variable("model/h0/mlp/c_fc/w", &[2, 8], 0.25),
            variable("model/wte", &[4, 2], -1.5),
        ]);

        let blob_a = dir.path().join("a.data");
        let blob_b = dir.path().join("b.data");
        convert_checkpoint(&reader, 1, &blob_a, &dir.path().join("a.json")).unwrap();
        convert_checkpoint(&reader, 1, &blob_b, &dir.path().join("b.json")).unwrap();

        assert_eq!(
            std::fs::read(&blob_a).unwrap(),
            std::fs::read(&blob_b).unwrap()
        );

        let manifest_a = Manifest::load(&dir.path().join("a.json")).unwrap();
        let manifest_b = Manifest::load(&dir.path().join("b.json")).unwrap();
        assert_eq!(manifest_a.model_index, manifest_b.model_index);
        assert_eq!(manifest_a.file_size, manifest_b.file_size);
    }
}
