use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filekeeper_core::{Config, DropboxSettings, ProviderKind};
use serde::Deserialize;
use tokio::fs;

use crate::traits::{RemoteFileRecord, StorageError, StorageProvider, StorageResult};

const API_BASE: &str = "https://api.dropboxapi.com/2";
const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";

/// Dropbox storage provider.
///
/// Remote ids are the backend-assigned `id:...` identifiers, which the API
/// accepts anywhere a path is accepted. Uploads use autorename, so collisions
/// get a backend-chosen suffix instead of overwriting.
#[derive(Clone)]
pub struct DropboxProvider {
    http: reqwest::Client,
    token: String,
    company_name: String,
    backup_prefix: String,
}

#[derive(Debug, Deserialize)]
struct EntryMetadata {
    #[serde(rename = ".tag")]
    tag: String,
    id: String,
    name: String,
    #[serde(default)]
    size: u64,
    server_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ListFolderResponse {
    entries: Vec<EntryMetadata>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FolderCreatedResponse {
    metadata: FolderMetadata,
}

#[derive(Debug, Deserialize)]
struct FolderMetadata {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error_summary: String,
}

impl DropboxProvider {
    fn validate_config(settings: &DropboxSettings) -> StorageResult<()> {
        if settings.token_path.as_os_str().is_empty() {
            return Err(StorageError::Config(
                "Dropbox token path is not configured".to_string(),
            ));
        }
        if !settings.token_path.is_file() {
            return Err(StorageError::Config(format!(
                "Dropbox token file not found: {}",
                settings.token_path.display()
            )));
        }
        Ok(())
    }

    /// Read the stored access token and verify it against the account
    /// endpoint before handing the provider out.
    pub async fn connect(config: &Config) -> StorageResult<Self> {
        Self::validate_config(&config.dropbox)?;

        let token = fs::read_to_string(&config.dropbox.token_path)
            .await
            .map_err(|e| {
                StorageError::Init(format!(
                    "Failed to read {}: {}",
                    config.dropbox.token_path.display(),
                    e
                ))
            })?
            .trim()
            .to_string();
        if token.is_empty() {
            return Err(StorageError::Config(format!(
                "Dropbox token file is empty: {}",
                config.dropbox.token_path.display()
            )));
        }

        let provider = DropboxProvider {
            http: reqwest::Client::new(),
            token,
            company_name: config.company_name.clone(),
            backup_prefix: config.backup_prefix.clone(),
        };
        provider.authenticate().await?;

        tracing::info!("Dropbox provider initialized");
        Ok(provider)
    }

    /// API path for a `/`-separated folder path. The API root is the empty
    /// string, everything else is absolute.
    fn api_path(folder_path: &str) -> String {
        let trimmed = folder_path.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Error summary from an RPC response body, falling back to the raw text.
    async fn error_summary(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(err) => err.error_summary,
            Err(_) => format!("{}: {}", status, body),
        }
    }

    async fn rpc(&self, endpoint: &str, body: serde_json::Value) -> StorageResult<reqwest::Response> {
        self.http
            .post(format!("{}{}", API_BASE, endpoint))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("{}: {}", endpoint, e)))
    }

    /// Fetch the id of an existing file or folder by path.
    async fn metadata_id(&self, path: &str) -> StorageResult<String> {
        let response = self
            .rpc("/files/get_metadata", serde_json::json!({ "path": path }))
            .await?;
        if !response.status().is_success() {
            return Err(StorageError::Folder(Self::error_summary(response).await));
        }
        let meta: FolderMetadata = response
            .json()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(meta.id)
    }
}

#[async_trait]
impl StorageProvider for DropboxProvider {
    async fn authenticate(&self) -> StorageResult<()> {
        let response = self
            .http
            .post(format!("{}/users/get_current_account", API_BASE))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| StorageError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Auth(Self::error_summary(response).await));
        }
        Ok(())
    }

    async fn upload_file(&self, local_path: &Path, destination: &str) -> StorageResult<String> {
        let file_name = local_path
            .file_name()
            .ok_or_else(|| StorageError::Upload(format!("No file name: {}", local_path.display())))?
            .to_string_lossy()
            .into_owned();
        let remote_path = format!("{}/{}", Self::api_path(destination), file_name);

        let data = fs::read(local_path).await.map_err(|e| {
            StorageError::Upload(format!("Failed to read {}: {}", local_path.display(), e))
        })?;
        let size = data.len() as u64;

        let arg = serde_json::json!({
            "path": remote_path,
            "mode": "add",
            "autorename": true,
            "mute": false,
        });

        let start = std::time::Instant::now();
        let response = self
            .http
            .post(format!("{}/files/upload", CONTENT_BASE))
            .bearer_auth(&self.token)
            .header("Dropbox-API-Arg", arg.to_string())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            let summary = Self::error_summary(response).await;
            tracing::error!(
                path = %remote_path,
                size_bytes = size,
                error = %summary,
                "Dropbox upload failed"
            );
            return Err(StorageError::Upload(summary));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        tracing::info!(
            path = %remote_path,
            remote_id = %uploaded.id,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Dropbox upload successful"
        );

        Ok(uploaded.id)
    }

    async fn download_file(&self, remote_id: &str, local_path: &Path) -> StorageResult<()> {
        let arg = serde_json::json!({ "path": remote_id });
        let response = self
            .http
            .post(format!("{}/files/download", CONTENT_BASE))
            .bearer_auth(&self.token)
            .header("Dropbox-API-Arg", arg.to_string())
            .send()
            .await
            .map_err(|e| StorageError::Download(e.to_string()))?;

        if !response.status().is_success() {
            let summary = Self::error_summary(response).await;
            if summary.contains("not_found") {
                return Err(StorageError::NotFound(remote_id.to_string()));
            }
            return Err(StorageError::Download(summary));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| StorageError::Download(e.to_string()))?;
        fs::write(local_path, &data).await?;
        Ok(())
    }

    async fn list_files(&self, folder_path: &str) -> StorageResult<Vec<RemoteFileRecord>> {
        let response = self
            .rpc(
                "/files/list_folder",
                serde_json::json!({ "path": Self::api_path(folder_path) }),
            )
            .await?;

        if !response.status().is_success() {
            let summary = Self::error_summary(response).await;
            // A folder that was never created is just empty, not an error.
            if summary.contains("not_found") {
                return Ok(Vec::new());
            }
            return Err(StorageError::Backend(summary));
        }

        let mut listing: ListFolderResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let mut files = Vec::new();
        loop {
            for entry in listing.entries.drain(..) {
                if entry.tag != "file" {
                    continue;
                }
                files.push(RemoteFileRecord {
                    id: entry.id,
                    name: entry.name,
                    size: entry.size,
                    modified: entry.server_modified.unwrap_or_else(Utc::now),
                    url: None,
                });
            }
            if !listing.has_more {
                break;
            }
            let response = self
                .rpc(
                    "/files/list_folder/continue",
                    serde_json::json!({ "cursor": listing.cursor }),
                )
                .await?;
            if !response.status().is_success() {
                return Err(StorageError::Backend(Self::error_summary(response).await));
            }
            listing = response
                .json()
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }

        Ok(files)
    }

    async fn delete_file(&self, remote_id: &str) -> StorageResult<()> {
        let response = self
            .rpc("/files/delete_v2", serde_json::json!({ "path": remote_id }))
            .await?;

        if !response.status().is_success() {
            let summary = Self::error_summary(response).await;
            if summary.contains("not_found") {
                return Err(StorageError::NotFound(remote_id.to_string()));
            }
            return Err(StorageError::Delete(summary));
        }

        tracing::info!(remote_id = %remote_id, "Dropbox delete successful");
        Ok(())
    }

    async fn create_folder(&self, folder_path: &str) -> StorageResult<String> {
        // Create each segment in turn so intermediate folders exist too.
        let mut current = String::new();
        let mut leaf_id = None;
        for segment in folder_path.split('/').filter(|s| !s.is_empty()) {
            current = format!("{}/{}", current, segment);
            let response = self
                .rpc(
                    "/files/create_folder_v2",
                    serde_json::json!({ "path": current, "autorename": false }),
                )
                .await?;

            if response.status().is_success() {
                let created: FolderCreatedResponse = response
                    .json()
                    .await
                    .map_err(|e| StorageError::Folder(e.to_string()))?;
                leaf_id = Some(created.metadata.id);
            } else {
                let summary = Self::error_summary(response).await;
                if !summary.contains("conflict") {
                    return Err(StorageError::Folder(summary));
                }
                // Already exists; id comes from metadata lookup below.
                leaf_id = None;
            }
        }

        match leaf_id {
            Some(id) => Ok(id),
            None => self.metadata_id(&Self::api_path(folder_path)).await,
        }
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Dropbox
    }

    fn company_name(&self) -> &str {
        &self.company_name
    }

    fn backup_prefix(&self) -> &str {
        &self.backup_prefix
    }
}
