//! Checkpoint readers
//!
//! The converter treats the checkpoint as an abstract source of named f32
//! tensors behind the [`CheckpointReader`] trait: list the names once, then
//! load each variable on demand. The enumeration order decides the blob
//! layout, so implementations must enumerate deterministically.
//!
//! The concrete source is a safetensors container:
//!
//! ```text
//! Safetensors := HEADER METADATA TENSOR_DATA
//!
//! HEADER := metadata_len: u64 (little-endian)
//!
//! METADATA := JSON {
//!   "tensor_name": {
//!     "dtype": "F32" | "F16" | ...,
//!     "shape": [dim1, dim2, ...],
//!     "data_offsets": [start, end]
//!   },
//!   ...
//! }
//! ```
//!
//! Format specification: <https://github.com/huggingface/safetensors>

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, VolcarError};
use crate::variable::Variable;

/// Source of named checkpoint tensors
///
/// `variable_names` fixes the processing order; `load_variable` is called
/// exactly once per name, in that order.
pub trait CheckpointReader {
    /// Enumerate tensor names in the order they will be processed
    fn variable_names(&self) -> Vec<String>;

    /// Load one tensor by name
    ///
    /// # Errors
    ///
    /// Returns `FormatError` if the name is unknown or the stored tensor
    /// cannot be decoded as f32 values.
    fn load_variable(&self, name: &str) -> Result<Variable>;
}

/// JSON tensor metadata (internal)
#[derive(Debug, Deserialize)]
struct TensorMetadata {
    dtype: String,
    shape: Vec<usize>,
    data_offsets: [usize; 2],
}

/// Checkpoint backed by a safetensors container
///
/// Names enumerate in lexicographic order (the table is a `BTreeMap`), so
/// repeated conversions of the same checkpoint lay the blob out
/// identically.
#[derive(Debug, Clone)]
pub struct SafetensorsCheckpoint {
    tensors: BTreeMap<String, TensorInfo>,
    data: Vec<u8>,
}

/// Parsed metadata for one stored tensor
#[derive(Debug, Clone, PartialEq, Eq)]
struct TensorInfo {
    dtype: String,
    shape: Vec<usize>,
    data_offsets: [usize; 2],
}

impl SafetensorsCheckpoint {
    /// Parse a safetensors container from raw bytes
    ///
    /// # Errors
    ///
    /// Returns `FormatError` on a truncated header, malformed JSON
    /// metadata, or an out-of-range metadata length.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);

        let claimed_len = parse_header(&mut cursor)?;

        // Bound the claimed length against the container before allocating
        // anything from it; the table cannot extend past the file
        let available = data.len().saturating_sub(8);
        let metadata_len = usize::try_from(claimed_len)
            .ok()
            .filter(|&len| len <= available)
            .ok_or_else(|| VolcarError::FormatError {
                reason: format!(
                    "metadata length {claimed_len} overruns container ({} bytes)",
                    data.len()
                ),
            })?;

        let tensors = parse_metadata(&mut cursor, metadata_len)?;

        // In bounds: metadata_len <= data.len() - 8
        let data_start = 8 + metadata_len;

        Ok(Self {
            tensors,
            data: data[data_start..].to_vec(),
        })
    }

    /// Open and parse a safetensors file
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be read, plus the parse errors
    /// of [`Self::from_bytes`].
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| VolcarError::IoError {
            message: format!("read {}: {e}", path.display()),
        })?;
        Self::from_bytes(&data)
    }

    /// Number of tensors in the container
    #[must_use]
    pub fn tensor_count(&self) -> usize {
        self.tensors.len()
    }
}

impl CheckpointReader for SafetensorsCheckpoint {
    fn variable_names(&self) -> Vec<String> {
        // BTreeMap iteration is lexicographic, the fixed enumeration order
        self.tensors.keys().cloned().collect()
    }

    fn load_variable(&self, name: &str) -> Result<Variable> {
        let info = self
            .tensors
            .get(name)
            .ok_or_else(|| VolcarError::FormatError {
                reason: format!("tensor {name:?} not found in checkpoint"),
            })?;

        // The blob holds 4-byte floats only; any other dtype means the
        // checkpoint is not convertible
        if info.dtype != "F32" {
            return Err(VolcarError::FormatError {
                reason: format!(
                    "tensor {name:?} has dtype {}, expected F32",
                    info.dtype
                ),
            });
        }

        let [start, end] = info.data_offsets;
        if start > end || end > self.data.len() {
            return Err(VolcarError::FormatError {
                reason: format!(
                    "tensor {name:?}: data offsets [{start}, {end}) exceed data size {}",
                    self.data.len()
                ),
            });
        }

        let bytes = &self.data[start..end];
        if bytes.len() % 4 != 0 {
            return Err(VolcarError::FormatError {
                reason: format!(
                    "tensor {name:?}: data size {} is not a multiple of 4",
                    bytes.len()
                ),
            });
        }

        let values: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| {
                f32::from_le_bytes(chunk.try_into().expect("chunks_exact(4) yields 4 bytes"))
            })
            .collect();

        Variable::new(name, info.shape.clone(), values)
    }
}

/// Parse the 8-byte little-endian metadata length
fn parse_header(cursor: &mut Cursor<&[u8]>) -> Result<u64> {
    let mut buf = [0u8; 8];
    cursor
        .read_exact(&mut buf)
        .map_err(|e| VolcarError::FormatError {
            reason: format!("read safetensors header: {e}"),
        })?;
    Ok(u64::from_le_bytes(buf))
}

/// Parse the JSON tensor table; `len` is already bounded by the container
fn parse_metadata(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<BTreeMap<String, TensorInfo>> {
    let mut json_bytes = vec![0u8; len];
    cursor
        .read_exact(&mut json_bytes)
        .map_err(|e| VolcarError::FormatError {
            reason: format!("read safetensors metadata: {e}"),
        })?;

    let json_map: BTreeMap<String, TensorMetadata> =
        serde_json::from_slice(&json_bytes).map_err(|e| VolcarError::FormatError {
            reason: format!("parse safetensors metadata: {e}"),
        })?;

    Ok(json_map
        .into_iter()
        .map(|(name, meta)| {
            (
                name,
                TensorInfo {
                    dtype: meta.dtype,
                    shape: meta.shape,
                    data_offsets: meta.data_offsets,
                },
            )
        })
        .collect())
}
