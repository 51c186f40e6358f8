//! # Volcar
//!
//! Volcar (Spanish: "to dump") flattens a trained GPT-2 checkpoint into a
//! deployment-friendly artifact pair: a flat binary blob of every tensor's
//! f32 values concatenated, and a JSON manifest describing where each named
//! tensor lives inside the blob and how the flat names reassemble into the
//! model's layer hierarchy. A downstream inference engine memory-maps the
//! blob and uses the manifest to locate each tensor without re-parsing the
//! checkpoint format.
//!
//! ## Pipeline
//!
//! For each variable, in the checkpoint's enumeration order: squeeze
//! singleton dimensions from the shape, route the name to a layer block or
//! the top level, append the values to the blob at the current byte
//! cursor, and insert an index record at the routed location. After the
//! loop the blob size is verified against the cursor; only then is the
//! manifest written.
//!
//! ## Example
//!
//! ```rust,ignore
//! use volcar::checkpoint::SafetensorsCheckpoint;
//! use volcar::convert::convert_checkpoint;
//!
//! let reader = SafetensorsCheckpoint::open("model.safetensors".as_ref())?;
//! let report = convert_checkpoint(
//!     &reader,
//!     12,
//!     "model_file.data".as_ref(),
//!     "model_index.json".as_ref(),
//! )?;
//! println!("{} tensors, {} bytes", report.tensor_count(), report.blob_bytes);
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod blob;
pub mod checkpoint;
pub mod cli;
pub mod convert;
pub mod download;
pub mod error;
pub mod hparams;
pub mod index;
pub mod manifest;
pub mod route;
pub mod variable;

pub use blob::{BlobFile, BlobWriter};
pub use checkpoint::{CheckpointReader, SafetensorsCheckpoint};
pub use convert::{convert_checkpoint, ConversionReport};
pub use error::{Result, VolcarError};
pub use index::{IndexNode, ModelIndex, TensorRecord};
pub use manifest::Manifest;
pub use variable::Variable;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
