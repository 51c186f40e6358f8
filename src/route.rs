//! Variable name routing
//!
//! GPT-2 checkpoint variable names are flat slash-separated paths under a
//! fixed `model/` namespace. Transformer-layer tensors live under a first
//! segment of the form `h<digits>` (`model/h3/attn/c_attn/w`); everything
//! else (`model/wpe`, `model/ln_f/g`) belongs at the top level of the
//! index. The router strips the namespace and classifies the remainder
//! with a plain tokenizer: marker byte, digit run, separator. No regular
//! expressions.

use crate::error::{Result, VolcarError};

/// Fixed namespace prefix every checkpoint variable name carries
pub const NAMESPACE_PREFIX: &str = "model/";

/// First byte of a layer-block segment (`h0`, `h1`, ...)
pub const LAYER_MARKER: char = 'h';

/// Path separator inside variable names
pub const SEPARATOR: char = '/';

/// Destination of a routed variable name
///
/// Path segments borrow from the input name; routing allocates nothing
/// beyond the segment list itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    /// Tensor stored at the top level of the model index
    TopLevel {
        /// Ordered path segments below the namespace
        path: Vec<&'a str>,
    },
    /// Tensor stored inside numbered layer block `index`
    Block {
        /// Zero-based layer block number
        index: usize,
        /// Ordered path segments below the block
        path: Vec<&'a str>,
    },
}

impl Route<'_> {
    /// Path segments regardless of destination
    #[must_use]
    pub fn path(&self) -> &[&str] {
        match self {
            Route::TopLevel { path } | Route::Block { path, .. } => path,
        }
    }
}

/// Classify a checkpoint variable name
///
/// The name must start with [`NAMESPACE_PREFIX`]; anything else means the
/// checkpoint does not follow the assumed layout and the whole run must
/// abort. After the prefix, a first segment of `h` + digits + `/` selects
/// a layer block; only the first segment is ever examined, so nested
/// indicators (`model/h1/h2/x`) route to block 1 with `h2` as an ordinary
/// path segment.
///
/// # Errors
///
/// Returns `FormatError` if the prefix is missing, the path contains an
/// empty segment, or a layer number does not fit in `usize`.
///
/// # Examples
///
/// ```
/// use volcar::route::{route_name, Route};
///
/// let r = route_name("model/h2/mlp/c_fc/w").unwrap();
/// assert_eq!(r, Route::Block { index: 2, path: vec!["mlp", "c_fc", "w"] });
///
/// let r = route_name("model/wpe").unwrap();
/// assert_eq!(r, Route::TopLevel { path: vec!["wpe"] });
/// ```
pub fn route_name(name: &str) -> Result<Route<'_>> {
    let rest = name
        .strip_prefix(NAMESPACE_PREFIX)
        .ok_or_else(|| VolcarError::FormatError {
            reason: format!("variable {name:?} lacks the {NAMESPACE_PREFIX:?} namespace prefix"),
        })?;

    if let Some((index, sub)) = match_layer_block(rest) {
        return Ok(Route::Block {
            index: index.parse().map_err(|_| VolcarError::FormatError {
                reason: format!("variable {name:?}: layer number {index:?} is out of range"),
            })?,
            path: split_path(name, sub)?,
        });
    }

    Ok(Route::TopLevel {
        path: split_path(name, rest)?,
    })
}

/// Match `h<digits>/<rest>` at the start of a namespace-stripped name
///
/// Returns the digit run and the remainder after the separator, or `None`
/// if the first segment is not a layer indicator (wrong marker, no digits,
/// non-digit characters, or no separator at all).
fn match_layer_block(rest: &str) -> Option<(&str, &str)> {
    let candidate = rest.strip_prefix(LAYER_MARKER)?;
    let sep = candidate.find(SEPARATOR)?;
    let digits = &candidate[..sep];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits, &candidate[sep + 1..]))
}

/// Split a sub-path on the separator, rejecting empty segments
fn split_path<'a>(name: &str, sub: &'a str) -> Result<Vec<&'a str>> {
    let segments: Vec<&str> = sub.split(SEPARATOR).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(VolcarError::FormatError {
            reason: format!("variable {name:?} cannot be parsed into a path"),
        });
    }
    Ok(segments)
}
