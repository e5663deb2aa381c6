use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filekeeper_core::{Config, DriveSettings, ProviderKind};
use serde::Deserialize;
use tokio::fs;

use crate::traits::{RemoteFileRecord, StorageError, StorageProvider, StorageResult};

const API_BASE: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// Google Drive storage provider.
///
/// Remote ids are Drive file ids. Folder paths are resolved segment by
/// segment through parent-child queries; Drive allows duplicate names, so the
/// first match wins and uploads never overwrite.
#[derive(Clone)]
pub struct GoogleDriveProvider {
    http: reqwest::Client,
    access_token: String,
    root_folder_id: String,
    company_name: String,
    backup_prefix: String,
}

/// Token file written by the interactive authorization flow.
#[derive(Debug, Deserialize)]
struct StoredToken {
    token: Option<String>,
    refresh_token: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    size: Option<String>,
    #[serde(rename = "modifiedTime")]
    modified_time: Option<DateTime<Utc>>,
    #[serde(rename = "webViewLink")]
    web_view_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

impl GoogleDriveProvider {
    fn validate_config(settings: &DriveSettings) -> StorageResult<()> {
        if !settings.credentials_path.is_file() {
            return Err(StorageError::Config(format!(
                "Drive credentials file not found: {}",
                settings.credentials_path.display()
            )));
        }
        if !settings.token_path.is_file() {
            return Err(StorageError::Config(format!(
                "Drive token file not found: {} (run the interactive authorization first)",
                settings.token_path.display()
            )));
        }
        Ok(())
    }

    /// Load the stored token, refresh it when a refresh token is available,
    /// and verify the session with a one-file listing.
    pub async fn connect(config: &Config) -> StorageResult<Self> {
        Self::validate_config(&config.drive)?;

        let raw = fs::read_to_string(&config.drive.token_path).await.map_err(|e| {
            StorageError::Init(format!(
                "Failed to read {}: {}",
                config.drive.token_path.display(),
                e
            ))
        })?;
        let stored: StoredToken = serde_json::from_str(&raw).map_err(|e| {
            StorageError::Config(format!(
                "Malformed token file {}: {}",
                config.drive.token_path.display(),
                e
            ))
        })?;

        let http = reqwest::Client::new();
        let access_token = match (&stored.refresh_token, &stored.client_id, &stored.client_secret) {
            (Some(refresh), Some(id), Some(secret)) => {
                Self::refresh_token(&http, refresh, id, secret).await?
            }
            _ => stored.token.clone().ok_or_else(|| {
                StorageError::Config(format!(
                    "Token file {} has neither an access token nor refresh credentials",
                    config.drive.token_path.display()
                ))
            })?,
        };

        let provider = GoogleDriveProvider {
            http,
            access_token,
            root_folder_id: config.drive.root_folder_id.clone(),
            company_name: config.company_name.clone(),
            backup_prefix: config.backup_prefix.clone(),
        };
        provider.authenticate().await?;

        tracing::info!(root = %provider.root_folder_id, "Drive provider initialized");
        Ok(provider)
    }

    async fn refresh_token(
        http: &reqwest::Client,
        refresh_token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> StorageResult<String> {
        let response = http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await
            .map_err(|e| StorageError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Auth(format!(
                "Token refresh failed: {}",
                Self::error_body(response).await
            )));
        }
        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Auth(e.to_string()))?;
        Ok(refreshed.access_token)
    }

    async fn error_body(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        format!("{}: {}", status, body)
    }

    /// Find one folder named `name` directly under `parent_id`.
    async fn find_folder(&self, name: &str, parent_id: &str) -> StorageResult<Option<String>> {
        let query = format!(
            "name = '{}' and '{}' in parents and mimeType = '{}' and trashed = false",
            name.replace('\'', "\\'"),
            parent_id,
            FOLDER_MIME
        );
        let url = format!(
            "{}/files?q={}&fields=files(id,name)&pageSize=1",
            API_BASE,
            urlencoding::encode(&query)
        );

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StorageError::Folder(Self::error_body(response).await));
        }

        let listing: FileListResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(listing.files.into_iter().next().map(|f| f.id))
    }

    async fn make_folder(&self, name: &str, parent_id: &str) -> StorageResult<String> {
        let body = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME,
            "parents": [parent_id],
        });
        let response = self
            .http
            .post(format!("{}/files?fields=id", API_BASE))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::Folder(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StorageError::Folder(Self::error_body(response).await));
        }

        #[derive(Deserialize)]
        struct Created {
            id: String,
        }
        let created: Created = response
            .json()
            .await
            .map_err(|e| StorageError::Folder(e.to_string()))?;
        Ok(created.id)
    }

    /// Resolve a `/`-separated folder path to a folder id, creating missing
    /// segments when `create` is set. Without `create`, a missing segment
    /// resolves to `None`.
    async fn resolve_folder(&self, folder_path: &str, create: bool) -> StorageResult<Option<String>> {
        let mut current = self.root_folder_id.clone();
        for segment in folder_path.split('/').filter(|s| !s.is_empty()) {
            current = match self.find_folder(segment, &current).await? {
                Some(id) => id,
                None if create => self.make_folder(segment, &current).await?,
                None => return Ok(None),
            };
        }
        Ok(Some(current))
    }
}

#[async_trait]
impl StorageProvider for GoogleDriveProvider {
    async fn authenticate(&self) -> StorageResult<()> {
        let response = self
            .http
            .get(format!("{}/files?pageSize=1&fields=files(id)", API_BASE))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| StorageError::Auth(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StorageError::Auth(Self::error_body(response).await));
        }
        Ok(())
    }

    async fn upload_file(&self, local_path: &Path, destination: &str) -> StorageResult<String> {
        let file_name = local_path
            .file_name()
            .ok_or_else(|| StorageError::Upload(format!("No file name: {}", local_path.display())))?
            .to_string_lossy()
            .into_owned();
        let folder_id = self
            .resolve_folder(destination, true)
            .await?
            .ok_or_else(|| StorageError::Folder(destination.to_string()))?;

        // Two-step upload: create the file entry under its parent, then send
        // the bytes as a media upload against the new id.
        let metadata = serde_json::json!({
            "name": file_name,
            "parents": [folder_id],
        });
        let response = self
            .http
            .post(format!("{}/files?fields=id", API_BASE))
            .bearer_auth(&self.access_token)
            .json(&metadata)
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StorageError::Upload(Self::error_body(response).await));
        }

        #[derive(Deserialize)]
        struct Created {
            id: String,
        }
        let created: Created = response
            .json()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        let data = fs::read(local_path).await.map_err(|e| {
            StorageError::Upload(format!("Failed to read {}: {}", local_path.display(), e))
        })?;
        let size = data.len() as u64;

        let start = std::time::Instant::now();
        let response = self
            .http
            .patch(format!(
                "{}/files/{}?uploadType=media",
                UPLOAD_BASE, created.id
            ))
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            let detail = Self::error_body(response).await;
            tracing::error!(
                name = %file_name,
                remote_id = %created.id,
                size_bytes = size,
                error = %detail,
                "Drive upload failed"
            );
            return Err(StorageError::Upload(detail));
        }

        tracing::info!(
            name = %file_name,
            remote_id = %created.id,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Drive upload successful"
        );

        Ok(created.id)
    }

    async fn download_file(&self, remote_id: &str, local_path: &Path) -> StorageResult<()> {
        let response = self
            .http
            .get(format!("{}/files/{}?alt=media", API_BASE, remote_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| StorageError::Download(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(remote_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(StorageError::Download(Self::error_body(response).await));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| StorageError::Download(e.to_string()))?;
        fs::write(local_path, &data).await?;
        Ok(())
    }

    async fn list_files(&self, folder_path: &str) -> StorageResult<Vec<RemoteFileRecord>> {
        let folder_id = match self.resolve_folder(folder_path, false).await? {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };

        let query = format!(
            "'{}' in parents and mimeType != '{}' and trashed = false",
            folder_id, FOLDER_MIME
        );

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = format!(
                "{}/files?q={}&fields=nextPageToken,files(id,name,size,modifiedTime,webViewLink)&pageSize=1000",
                API_BASE,
                urlencoding::encode(&query)
            );
            if let Some(ref token) = page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let response = self
                .http
                .get(url)
                .bearer_auth(&self.access_token)
                .send()
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            if !response.status().is_success() {
                return Err(StorageError::Backend(Self::error_body(response).await));
            }

            let listing: FileListResponse = response
                .json()
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;

            for file in listing.files {
                files.push(RemoteFileRecord {
                    id: file.id,
                    name: file.name,
                    size: file.size.and_then(|s| s.parse().ok()).unwrap_or(0),
                    modified: file.modified_time.unwrap_or_else(Utc::now),
                    url: file.web_view_link,
                });
            }

            page_token = listing.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(files)
    }

    async fn delete_file(&self, remote_id: &str) -> StorageResult<()> {
        let response = self
            .http
            .delete(format!("{}/files/{}", API_BASE, remote_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| StorageError::Delete(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(remote_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(StorageError::Delete(Self::error_body(response).await));
        }

        tracing::info!(remote_id = %remote_id, "Drive delete successful");
        Ok(())
    }

    async fn create_folder(&self, folder_path: &str) -> StorageResult<String> {
        self.resolve_folder(folder_path, true)
            .await?
            .ok_or_else(|| StorageError::Folder(folder_path.to_string()))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleDrive
    }

    fn company_name(&self) -> &str {
        &self.company_name
    }

    fn backup_prefix(&self) -> &str {
        &self.backup_prefix
    }
}
