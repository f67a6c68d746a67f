#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Output assembly for crawled offers.
//!
//! Collapses duplicate offers, attaches a stable product ID and per-product
//! offer counts, orders everything with Czech collation, and writes the
//! semicolon-delimited table and the JSON feed consumed downstream.

pub mod catalog;
pub mod collation;
pub mod csv_export;
pub mod dedupe;
pub mod feed;
pub mod normalize;

use std::path::{Path, PathBuf};

/// Errors from assembling or writing the outputs.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// An output file could not be written.
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV serialization failed.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// JSON serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Czech collation data could not be loaded.
    #[error("Failed to load collation data: {0}")]
    Collation(String),
}

/// Writes `bytes` to `path` through a sibling temporary file, so a failed
/// run never leaves a truncated output behind.
///
/// # Errors
///
/// Returns [`OutputError::Write`] if the file cannot be written or moved
/// into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), OutputError> {
    let write_err = |source: std::io::Error| OutputError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, bytes).map_err(write_err)?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        write_err(e)
    })?;

    log::debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
