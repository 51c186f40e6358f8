//! Checkpoint asset downloader
//!
//! Standalone utility with no coupling to the conversion pipeline: stream
//! an HTTP response body to disk in fixed-size chunks with a progress bar.
//! No retry, no resume; a failed transfer is a failed transfer.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

use crate::error::{Result, VolcarError};

/// Transfer chunk size in bytes
pub const CHUNK_SIZE: usize = 4096;

/// Download a file over HTTP, returning the bytes transferred
///
/// Parent directories of `dest` are created as needed. Progress is
/// reported on a byte-styled bar sized from the response's
/// `Content-Length` when present.
///
/// # Errors
///
/// Returns `ConnectionError` if the request fails or the server answers
/// with a non-success status, and `IoError` if the destination cannot be
/// written.
pub fn download_file(url: &str, dest: &Path) -> Result<u64> {
    let client = Client::builder()
        .build()
        .map_err(|e| VolcarError::ConnectionError(format!("build HTTP client: {e}")))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| VolcarError::ConnectionError(format!("HTTP request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(VolcarError::ConnectionError(format!(
            "HTTP {} from {url}",
            response.status()
        )));
    }

    let total = response.content_length().unwrap_or(0);
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| VolcarError::IoError {
                message: format!("create {}: {e}", parent.display()),
            })?;
        }
    }
    let mut file = File::create(dest).map_err(|e| VolcarError::IoError {
        message: format!("create {}: {e}", dest.display()),
    })?;

    let mut source = response;
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut transferred = 0u64;
    loop {
        let n = source
            .read(&mut buffer)
            .map_err(|e| VolcarError::ConnectionError(format!("read response body: {e}")))?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])
            .map_err(|e| VolcarError::IoError {
                message: format!("write {}: {e}", dest.display()),
            })?;
        transferred += n as u64;
        bar.set_position(transferred);
    }

    file.flush().map_err(|e| VolcarError::IoError {
        message: format!("flush {}: {e}", dest.display()),
    })?;
    bar.finish();

    Ok(transferred)
}
