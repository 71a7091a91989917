//! # LogCascade
//!
//! LogCascade rotates a log file into a bounded, numbered history of backups
//! right before a file sink (re)opens it. When the main file has reached the
//! configured size, every existing backup is shifted one index up
//! (`app.log.01` becomes `app.log.02`, and so on), the main file becomes
//! `app.log.01` and the oldest backups beyond the retention cap are deleted.
//! The sink then starts over with a fresh main file.
//!
//! Rotation is evaluated only when the file is opened, never per write, and it
//! never fails the sink: every rename or delete is best-effort and whatever
//! went wrong is reported back in a [`RotationReport`].
//!
//! ## Example
//!
//! ```rust
//! use {
//!    logcascade::{RotatingFileBuilder, RotationSize},
//!    std::io::Write,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!    let dir = tempfile::tempdir()?;
//!    let mut sink = RotatingFileBuilder::new(dir.path().join("app.log"))
//!        .rotation_size(RotationSize::KB(5)) // Rotate once the file holds 5 KB
//!        .max_keep_files(3) // Keep app.log.01 .. app.log.03
//!        .build()?;
//!
//!    writeln!(sink, "This is an info message")?;
//!
//!    // Long-running processes rotate by re-opening the sink.
//!    let report = sink.reopen()?;
//!    assert!(!report.rotated());
//!
//!    Ok(())
//! }
//! ```
use std::{io, path::PathBuf};

pub mod config;
pub mod engine;
pub mod fs;
pub mod inventory;
pub mod sink;

pub use {
    config::{RotationConfig, RotationSize, DEFAULT_FORMAT, DEFAULT_INDEX_WIDTH, MAX_INDEX_WIDTH},
    engine::{RotationEngine, RotationOutcome, RotationReport},
    fs::{split_path, FileKind, FileSystem, ListFilter, MemoryFileSystem, PathInfo, RealFileSystem},
    inventory::{BackupFile, RotationInventory},
    sink::{
        FileSink, FileStrategy, LogType, PlainFileStrategy, RotatingFile, RotatingFileBuilder, RotationStrategy,
        Severity,
    },
};

/// Errors that can occur while configuring a sink, rotating its backups or
/// opening its main file.
#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error("Invalid backup index width {0}: expected 1..={max}", max = config::MAX_INDEX_WIDTH)]
    InvalidIndexWidth(usize),
    #[error("Cannot keep {retention} backups with {width}-digit indices (at most {max})")]
    RetentionTooLarge { retention: u32, width: usize, max: u32 },
    #[error("Failed to create directory '{0}': {1}")]
    CreateDirectoryFailed(PathBuf, String),
    #[error("Failed to create file '{0}': {1}")]
    CreateFileFailed(PathBuf, String),
    #[error("Failed to rename file from '{from}' to '{to}': {error}")]
    RenameFileError { from: PathBuf, to: PathBuf, error: String },
    #[error("Failed to remove file '{path}': {error}")]
    RemoveFileError { path: PathBuf, error: String },
    #[error("Backup slot '{0}' is still occupied, main file left in place")]
    BackupSlotOccupied(PathBuf),
    #[error("File IO error: {0}")]
    FileIOError(#[from] io::Error),
    #[error("Failed to set file permissions for '{path}': {error}")]
    SetFilePermissionsError { path: PathBuf, error: String },
}
