use std::path::PathBuf;

use filekeeper_storage::StorageError;
use thiserror::Error;

/// Backup pipeline errors
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("No backup bundles found in {0}")]
    NoBundles(PathBuf),

    #[error("Bundle file not found: {0}")]
    MissingBundle(PathBuf),

    #[error("Bundle came out empty: {0}")]
    EmptyBundle(PathBuf),

    #[error("Archiver exited with an error: {0}")]
    ArchiverFailed(String),

    #[error("Archiver binary not found (is `zip` installed?)")]
    ArchiverMissing,

    #[error("Mirror sync exited with an error: {0}")]
    SyncFailed(String),

    #[error("Sync binary not found (is `rsync` installed?)")]
    SyncMissing,

    #[error("Upload state file is unusable: {0}")]
    State(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
