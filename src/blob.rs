//! Blob writing and reading
//!
//! The blob is the flat binary half of the artifact pair: every tensor's
//! values concatenated as 4-byte native-endian floats, no header, no
//! padding, no framing. [`BlobWriter`] owns the byte cursor that ties the
//! blob to the index: the cursor value at the moment a tensor is appended
//! becomes that tensor's `pos`, and after the writer is finished the
//! cursor total must equal the file size on disk.
//!
//! [`BlobFile`] is the read side, memory-mapping the blob so a consumer
//! can extract any record without loading the whole file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{Result, VolcarError};
use crate::index::TensorRecord;

/// Append-only blob writer with an explicit byte cursor
#[derive(Debug)]
pub struct BlobWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    cursor: u64,
}

impl BlobWriter {
    /// Create (truncating) the blob file
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| VolcarError::IoError {
            message: format!("create {}: {e}", path.display()),
        })?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            cursor: 0,
        })
    }

    /// Append values as 4-byte native-endian floats
    ///
    /// Returns the byte offset the values start at, i.e. the cursor value
    /// before the write. The cursor advances by `4 × values.len()`.
    ///
    /// # Errors
    ///
    /// Returns `IoError` on a failed write.
    pub fn append(&mut self, values: &[f32]) -> Result<u64> {
        let pos = self.cursor;
        for v in values {
            self.writer
                .write_all(&v.to_ne_bytes())
                .map_err(|e| VolcarError::IoError {
                    message: format!("write {}: {e}", self.path.display()),
                })?;
        }
        self.cursor += 4 * values.len() as u64;
        Ok(pos)
    }

    /// Bytes accounted for so far
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Flush, close, and verify the blob
    ///
    /// Compares the final cursor value against the file size the
    /// filesystem reports. Returns the verified total byte count.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if flushing or stat-ing fails and
    /// `IntegrityError` if the sizes disagree.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush().map_err(|e| VolcarError::IoError {
            message: format!("flush {}: {e}", self.path.display()),
        })?;
        drop(self.writer);
        verify_blob_size(&self.path, self.cursor)?;
        Ok(self.cursor)
    }
}

/// Compare an expected byte total against the blob's size on disk
///
/// # Errors
///
/// Returns `IoError` if the file cannot be measured and `IntegrityError`
/// naming both values if they differ.
pub fn verify_blob_size(path: &Path, expected: u64) -> Result<()> {
    let actual = std::fs::metadata(path)
        .map_err(|e| VolcarError::IoError {
            message: format!("stat {}: {e}", path.display()),
        })?
        .len();
    if actual != expected {
        return Err(VolcarError::IntegrityError { expected, actual });
    }
    Ok(())
}

/// Memory-mapped read access to a finished blob
#[derive(Debug)]
pub struct BlobFile {
    mmap: Mmap,
}

impl BlobFile {
    /// Open a blob file read-only
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be opened or mapped.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| VolcarError::IoError {
            message: format!("open {}: {e}", path.display()),
        })?;

        // SAFETY: read-only mapping; every access below is bounds-checked
        let mmap = unsafe {
            Mmap::map(&file).map_err(|e| VolcarError::IoError {
                message: format!("mmap {}: {e}", path.display()),
            })?
        };

        Ok(Self { mmap })
    }

    /// Total blob size in bytes
    #[must_use]
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// Whether the blob holds no bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Extract a record's values from the blob
    ///
    /// Reads `record.size` 4-byte native-endian floats starting at
    /// `record.pos`.
    ///
    /// # Errors
    ///
    /// Returns `FormatError` if the record's extent falls outside the
    /// mapped file.
    pub fn read_record(&self, record: &TensorRecord) -> Result<Vec<f32>> {
        let start = usize::try_from(record.pos).map_err(|_| VolcarError::FormatError {
            reason: format!("record offset {} exceeds platform usize limit", record.pos),
        })?;
        let byte_len = usize::try_from(4 * record.size).map_err(|_| VolcarError::FormatError {
            reason: format!("record size {} exceeds platform usize limit", record.size),
        })?;
        let end = start
            .checked_add(byte_len)
            .ok_or_else(|| VolcarError::FormatError {
                reason: format!("record at {start} with {byte_len} bytes overflows"),
            })?;
        if end > self.mmap.len() {
            return Err(VolcarError::FormatError {
                reason: format!(
                    "record extent [{start}, {end}) exceeds blob size {}",
                    self.mmap.len()
                ),
            });
        }

        Ok(self.mmap[start..end]
            .chunks_exact(4)
            .map(|chunk| {
                f32::from_ne_bytes(chunk.try_into().expect("chunks_exact(4) yields 4 bytes"))
            })
            .collect())
    }
}
