//! Storage provider abstraction
//!
//! This module defines the `StorageProvider` trait that all backends must
//! implement, the error taxonomy shared by every backend, and the record type
//! returned by list operations.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filekeeper_core::{BestEffort, ProviderKind};
use thiserror::Error;

/// Storage operation errors
///
/// Backend-native errors are converted into one of these variants at the
/// provider boundary; callers never see reqwest or AWS SDK error types.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Init(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Delete failed: {0}")]
    Delete(String),

    #[error("Folder operation failed: {0}")]
    Folder(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid remote id: {0}")]
    InvalidId(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A file as reported by a provider's list operation.
///
/// `id` is the backend-specific remote id (see the crate root documentation);
/// `url` is a browse/share link where the backend has one.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RemoteFileRecord {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub url: Option<String>,
}

/// Identity of a constructed provider, for run summaries and health checks.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProviderInfo {
    pub kind: ProviderKind,
    pub company_name: String,
    pub backup_prefix: String,
}

/// Storage provider abstraction
///
/// Backends implement the seven primitives; retention, retry, and bundle
/// naming all live above this layer and stay backend-agnostic.
///
/// Construction is two-phase on each concrete variant: configuration is
/// validated (required settings present, referenced credential files on disk)
/// before any client is built, and `connect` performs one cheap round-trip so
/// bad credentials fail fast. A variant whose validation fails never touches
/// the network.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Re-validate the session with a cheap round-trip. Idempotent; safe to
    /// call repeatedly.
    async fn authenticate(&self) -> StorageResult<()>;

    /// Upload a local file into `destination` (a `/`-separated remote folder
    /// path, created if absent) and return the remote id.
    ///
    /// Collision policy is per-backend: local disk appends a numeric suffix;
    /// backends that key objects by path+name overwrite by design.
    async fn upload_file(&self, local_path: &Path, destination: &str) -> StorageResult<String>;

    /// Download the file identified by `remote_id` to `local_path`.
    async fn download_file(&self, remote_id: &str, local_path: &Path) -> StorageResult<()>;

    /// List files directly under `folder_path` (one level, files only).
    /// A folder that does not exist remotely yields an empty list, not an error.
    async fn list_files(&self, folder_path: &str) -> StorageResult<Vec<RemoteFileRecord>>;

    /// Delete the file identified by `remote_id`.
    async fn delete_file(&self, remote_id: &str) -> StorageResult<()>;

    /// Create `folder_path`, including intermediate segments. Succeeds as a
    /// no-op when the folder already exists. Returns the folder's remote id.
    async fn create_folder(&self, folder_path: &str) -> StorageResult<String>;

    fn kind(&self) -> ProviderKind;

    fn company_name(&self) -> &str;

    fn backup_prefix(&self) -> &str;

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            kind: self.kind(),
            company_name: self.company_name().to_string(),
            backup_prefix: self.backup_prefix().to_string(),
        }
    }

    /// Remote folder bundles of a given tier are uploaded to.
    fn backup_destination(&self, tier: &str) -> String {
        format!("{}/{}", self.backup_prefix(), tier)
    }

    /// Upload a bundle into its tier folder.
    async fn upload_backup(&self, bundle_path: &Path, tier: &str) -> StorageResult<String> {
        let destination = self.backup_destination(tier);
        let remote_id = self.upload_file(bundle_path, &destination).await?;
        tracing::info!(
            bundle = %bundle_path.display(),
            destination = %destination,
            remote_id = %remote_id,
            "Backup uploaded"
        );
        Ok(remote_id)
    }

    /// Health probe: list the root folder and report success without
    /// propagating the underlying error.
    async fn test_connection(&self) -> bool {
        match self.list_files("").await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(provider = %self.kind(), error = %e, "Connection test failed");
                false
            }
        }
    }

    /// Best-effort remote pruning: keep the `max_count` newest files in the
    /// tier folder, delete the rest. A single deletion failure is logged and
    /// skipped, not fatal to the batch.
    async fn cleanup_old_backups(&self, max_count: usize, tier: &str) -> BestEffort {
        let folder = self.backup_destination(tier);
        let mut files = match self.list_files(&folder).await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(folder = %folder, error = %e, "Cleanup listing failed");
                return BestEffort::Failed {
                    error: format!("list {}: {}", folder, e),
                };
            }
        };

        if files.len() <= max_count {
            return BestEffort::Complete;
        }

        files.sort_by(|a, b| b.modified.cmp(&a.modified));

        let mut errors = Vec::new();
        for old in &files[max_count..] {
            match self.delete_file(&old.id).await {
                Ok(()) => {
                    tracing::info!(name = %old.name, "Pruned old backup");
                }
                Err(e) => {
                    tracing::warn!(name = %old.name, error = %e, "Could not delete old backup");
                    errors.push(format!("{}: {}", old.name, e));
                }
            }
        }
        BestEffort::from_errors(errors)
    }
}
