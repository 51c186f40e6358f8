//! Nested tensor index
//!
//! The model index mirrors the logical hierarchy of the checkpoint's
//! variable names: an ordered tree whose leaves record where each tensor
//! lives inside the blob. The tree is an explicit tagged type rather than
//! a free-form JSON map, so inserting through an existing record or
//! inserting the same path twice is a hard error instead of a silent
//! overwrite.
//!
//! ## Serialized form
//!
//! ```text
//! {
//!   "blocks": [ { "attn": { "c_attn": { "w": {pos, size, shape}, ... } } }, ... ],
//!   "wpe": {pos, size, shape},
//!   "ln_f": { "g": {...}, "b": {...} }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolcarError};
use crate::route::Route;

/// Location and extent of one tensor inside the blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorRecord {
    /// Byte offset of the first element
    pub pos: u64,
    /// Element count (elements, not bytes)
    pub size: u64,
    /// Shape with singleton dimensions removed
    pub shape: Vec<usize>,
}

/// One node of the index tree: a tensor record or a nested group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexNode {
    /// Terminal record for a single tensor
    Leaf(TensorRecord),
    /// Nested mapping from path segment to child node
    Branch(BTreeMap<String, IndexNode>),
}

impl IndexNode {
    /// Create an empty group node
    #[must_use]
    pub fn empty_branch() -> Self {
        Self::Branch(BTreeMap::new())
    }

    /// Insert a record at the nested location described by `path`
    ///
    /// Missing intermediate groups are created on demand.
    ///
    /// # Errors
    ///
    /// Returns `FormatError` if the path is empty, descends through an
    /// existing record, or ends at an already-occupied key.
    pub fn insert(&mut self, path: &[&str], record: TensorRecord) -> Result<()> {
        match self {
            Self::Branch(children) => insert_into(children, path, record),
            Self::Leaf(_) => Err(VolcarError::FormatError {
                reason: format!("path {path:?} descends through an existing tensor record"),
            }),
        }
    }

    /// Walk the tree along `path`, returning the node it ends at
    #[must_use]
    pub fn get(&self, path: &[&str]) -> Option<&IndexNode> {
        match path {
            [] => Some(self),
            [head, rest @ ..] => match self {
                Self::Branch(children) => children.get(*head)?.get(rest),
                Self::Leaf(_) => None,
            },
        }
    }

    /// Walk the tree along `path`, returning the record it ends at
    #[must_use]
    pub fn record(&self, path: &[&str]) -> Option<&TensorRecord> {
        match self.get(path)? {
            Self::Leaf(record) => Some(record),
            Self::Branch(_) => None,
        }
    }

    /// Number of records beneath this node
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Branch(children) => children.values().map(IndexNode::leaf_count).sum(),
        }
    }
}

/// Typed insertion into an ordered child map, creating branches on demand
fn insert_into(
    children: &mut BTreeMap<String, IndexNode>,
    path: &[&str],
    record: TensorRecord,
) -> Result<()> {
    match path {
        [] => Err(VolcarError::FormatError {
            reason: "cannot insert a tensor record at an empty path".to_string(),
        }),
        [last] => {
            if children.contains_key(*last) {
                return Err(VolcarError::FormatError {
                    reason: format!("duplicate index entry at {last:?}"),
                });
            }
            children.insert((*last).to_string(), IndexNode::Leaf(record));
            Ok(())
        },
        [head, rest @ ..] => children
            .entry((*head).to_string())
            .or_insert_with(IndexNode::empty_branch)
            .insert(rest, record),
    }
}

/// Full nested index for one model
///
/// `blocks` holds one sub-index per transformer layer; every other tensor
/// hangs directly off the top level. The globals map serializes flattened,
/// so the JSON carries `blocks` alongside keys like `wpe` and `ln_f`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelIndex {
    /// Per-layer tensor groups, index 0..n_layer-1
    pub blocks: Vec<IndexNode>,
    /// Tensors outside any layer block (embeddings, final norm)
    #[serde(flatten)]
    pub globals: BTreeMap<String, IndexNode>,
}

impl ModelIndex {
    /// Create an index with `n_layer` empty layer blocks
    #[must_use]
    pub fn new(n_layer: usize) -> Self {
        Self {
            blocks: vec![IndexNode::empty_branch(); n_layer],
            globals: BTreeMap::new(),
        }
    }

    /// Insert a record at the destination a routed name describes
    ///
    /// The top-level key `blocks` is reserved for the layer block list:
    /// the globals map serializes flattened next to it, so a tensor named
    /// `blocks` would emit a duplicate JSON key and shadow the real list
    /// on reload.
    ///
    /// # Errors
    ///
    /// Returns `FormatError` if the block index is out of range, the
    /// path collides with an existing entry, or a top-level path starts
    /// with the reserved `blocks` key.
    pub fn insert(&mut self, route: &Route<'_>, record: TensorRecord) -> Result<()> {
        match route {
            Route::Block { index, path } => {
                let n_blocks = self.blocks.len();
                let block =
                    self.blocks
                        .get_mut(*index)
                        .ok_or_else(|| VolcarError::FormatError {
                            reason: format!(
                                "layer block {index} out of range (model has {n_blocks} blocks)"
                            ),
                        })?;
                block.insert(path, record)
            },
            Route::TopLevel { path } => {
                if path.first() == Some(&"blocks") {
                    return Err(VolcarError::FormatError {
                        reason: "top-level name \"blocks\" collides with the layer block list"
                            .to_string(),
                    });
                }
                insert_into(&mut self.globals, path, record)
            },
        }
    }

    /// Look up a top-level record by path segments
    #[must_use]
    pub fn record(&self, path: &[&str]) -> Option<&TensorRecord> {
        let (head, rest) = path.split_first()?;
        self.globals.get(*head)?.record(rest)
    }

    /// Look up a record inside layer block `index`
    #[must_use]
    pub fn block_record(&self, index: usize, path: &[&str]) -> Option<&TensorRecord> {
        self.blocks.get(index)?.record(path)
    }

    /// Number of layer blocks
    #[must_use]
    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Total record count across blocks and top-level entries
    #[must_use]
    pub fn tensor_count(&self) -> usize {
        let in_blocks: usize = self.blocks.iter().map(IndexNode::leaf_count).sum();
        let in_globals: usize = self.globals.values().map(IndexNode::leaf_count).sum();
        in_blocks + in_globals
    }
}
