//! GPT-2 hyper-parameters
//!
//! The checkpoint ships with an `hparams.json` next to the weight files.
//! The converter only needs `n_layer` (to size the per-layer blocks list),
//! but the full set is carried so the manifest's consumers can read one
//! struct instead of re-parsing the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolcarError};

/// Hyper-parameters from the checkpoint's `hparams.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HParams {
    /// Vocabulary size
    pub n_vocab: usize,
    /// Context window length
    pub n_ctx: usize,
    /// Embedding dimension
    pub n_embd: usize,
    /// Attention head count
    pub n_head: usize,
    /// Transformer layer count (sizes the index's blocks list)
    pub n_layer: usize,
}

impl HParams {
    /// Load hyper-parameters from a JSON file
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be read and `FormatError` if
    /// the JSON does not carry the expected fields.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| VolcarError::IoError {
            message: format!("read {}: {e}", path.display()),
        })?;
        serde_json::from_str(&content).map_err(|e| VolcarError::FormatError {
            reason: format!("parse {}: {e}", path.display()),
        })
    }
}

/// Locate `hparams.json` next to a checkpoint file
///
/// Used when the CLI is given a checkpoint path but no explicit hparams
/// path. The file is not required to exist; the caller decides whether a
/// missing sibling is fatal.
#[must_use]
pub fn sibling_hparams_path(checkpoint_path: &Path) -> PathBuf {
    checkpoint_path.with_file_name("hparams.json")
}
