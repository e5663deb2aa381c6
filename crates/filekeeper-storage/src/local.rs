use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filekeeper_core::{Config, ProviderKind};
use tokio::fs;

use crate::traits::{RemoteFileRecord, StorageError, StorageProvider, StorageResult};

/// Local filesystem storage provider, for testing and offline use.
///
/// Remote ids are paths relative to the storage root. Filename collisions on
/// upload are resolved by appending `_{n}` before the extension; nothing is
/// overwritten.
#[derive(Clone)]
pub struct LocalProvider {
    storage_path: PathBuf,
    company_name: String,
    backup_prefix: String,
}

impl LocalProvider {
    /// Validate the configured storage path and prepare the storage root.
    /// Local storage needs no credentials, so there is no network round-trip.
    pub async fn connect(config: &Config) -> StorageResult<Self> {
        let storage_path = config.local.storage_path.clone();
        if storage_path.as_os_str().is_empty() {
            return Err(StorageError::Config(
                "Local storage path is not configured".to_string(),
            ));
        }

        fs::create_dir_all(&storage_path).await.map_err(|e| {
            StorageError::Init(format!(
                "Failed to create storage directory {}: {}",
                storage_path.display(),
                e
            ))
        })?;

        Ok(LocalProvider {
            storage_path,
            company_name: config.company_name.clone(),
            backup_prefix: config.backup_prefix.clone(),
        })
    }

    /// Convert a remote id to a filesystem path, rejecting ids that could
    /// escape the storage root.
    fn id_to_path(&self, remote_id: &str) -> StorageResult<PathBuf> {
        if remote_id.contains("..") || remote_id.starts_with('/') {
            return Err(StorageError::InvalidId(remote_id.to_string()));
        }
        Ok(self.storage_path.join(remote_id))
    }

    fn relative_id(&self, path: &Path) -> StorageResult<String> {
        let rel = path
            .strip_prefix(&self.storage_path)
            .map_err(|_| StorageError::InvalidId(path.display().to_string()))?;
        Ok(rel.to_string_lossy().replace('\\', "/"))
    }

    /// First non-colliding destination path: `name.ext`, then `name_1.ext`, ...
    async fn unique_destination(&self, dest_dir: &Path, file_name: &Path) -> PathBuf {
        let candidate = dest_dir.join(file_name);
        if !candidate.exists() {
            return candidate;
        }

        let stem = file_name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = file_name
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut counter = 1;
        loop {
            let candidate = dest_dir.join(format!("{}_{}{}", stem, counter, ext));
            if !candidate.exists() {
                return candidate;
            }
            counter += 1;
        }
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    async fn authenticate(&self) -> StorageResult<()> {
        // Local storage has no session to validate.
        Ok(())
    }

    async fn upload_file(&self, local_path: &Path, destination: &str) -> StorageResult<String> {
        let dest_dir = self.id_to_path(destination)?;
        fs::create_dir_all(&dest_dir).await.map_err(|e| {
            StorageError::Folder(format!("Failed to create {}: {}", dest_dir.display(), e))
        })?;

        let file_name = local_path
            .file_name()
            .ok_or_else(|| StorageError::Upload(format!("No file name: {}", local_path.display())))?;
        let dest_path = self.unique_destination(&dest_dir, Path::new(file_name)).await;

        let start = std::time::Instant::now();
        let bytes = fs::copy(local_path, &dest_path).await.map_err(|e| {
            StorageError::Upload(format!(
                "Failed to copy {} to {}: {}",
                local_path.display(),
                dest_path.display(),
                e
            ))
        })?;

        let remote_id = self.relative_id(&dest_path)?;

        tracing::info!(
            remote_id = %remote_id,
            size_bytes = bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(remote_id)
    }

    async fn download_file(&self, remote_id: &str, local_path: &Path) -> StorageResult<()> {
        let source = self.id_to_path(remote_id)?;
        if !fs::try_exists(&source).await.unwrap_or(false) {
            return Err(StorageError::NotFound(remote_id.to_string()));
        }

        fs::copy(&source, local_path).await.map_err(|e| {
            StorageError::Download(format!(
                "Failed to copy {} to {}: {}",
                source.display(),
                local_path.display(),
                e
            ))
        })?;
        Ok(())
    }

    async fn list_files(&self, folder_path: &str) -> StorageResult<Vec<RemoteFileRecord>> {
        let search_path = if folder_path.is_empty() {
            self.storage_path.clone()
        } else {
            self.id_to_path(folder_path)?
        };

        if !fs::try_exists(&search_path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&search_path)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to list {}: {}", search_path.display(), e)))?;

        // One directory level, regular files only.
        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        {
            let meta = entry
                .metadata()
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            if !meta.is_file() {
                continue;
            }

            let modified: DateTime<Utc> = meta
                .modified()
                .map(DateTime::from)
                .unwrap_or_else(|_| Utc::now());

            files.push(RemoteFileRecord {
                id: self.relative_id(&entry.path())?,
                name: entry.file_name().to_string_lossy().into_owned(),
                size: meta.len(),
                modified,
                url: Some(entry.path().display().to_string()),
            });
        }

        Ok(files)
    }

    async fn delete_file(&self, remote_id: &str) -> StorageResult<()> {
        let path = self.id_to_path(remote_id)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(remote_id.to_string()));
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::Delete(format!("Failed to delete {}: {}", path.display(), e))
        })?;

        tracing::info!(remote_id = %remote_id, "Local storage delete successful");
        Ok(())
    }

    async fn create_folder(&self, folder_path: &str) -> StorageResult<String> {
        let path = self.id_to_path(folder_path)?;
        fs::create_dir_all(&path).await.map_err(|e| {
            StorageError::Folder(format!("Failed to create {}: {}", path.display(), e))
        })?;
        self.relative_id(&path)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn company_name(&self) -> &str {
        &self.company_name
    }

    fn backup_prefix(&self) -> &str {
        &self.backup_prefix
    }
}
