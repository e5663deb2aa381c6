use std::path::Path;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use filekeeper_core::{Config, ProviderKind, S3Settings};
use tokio::fs;

use crate::traits::{RemoteFileRecord, StorageError, StorageProvider, StorageResult};

/// S3-compatible storage provider.
///
/// Remote ids are object keys. Folders are simulated with zero-byte keys
/// ending in `/`; uploads into the same destination with the same file name
/// overwrite the existing object, which is what bucket semantics give us.
#[derive(Clone)]
pub struct S3Provider {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
    company_name: String,
    backup_prefix: String,
}

impl S3Provider {
    fn validate_config(settings: &S3Settings) -> StorageResult<()> {
        if settings.bucket.is_empty() {
            return Err(StorageError::Config(
                "S3 bucket name is not configured".to_string(),
            ));
        }
        if settings.region.is_empty() {
            return Err(StorageError::Config(
                "S3 region is not configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the client and verify credentials with a `list_buckets` call.
    pub async fn connect(config: &Config) -> StorageResult<Self> {
        Self::validate_config(&config.s3)?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.s3.region.clone()));
        if let Some(ref endpoint) = config.s3.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if config.s3.endpoint.is_some() {
            // Path-style addressing for MinIO, Spaces, and friends.
            builder = builder.force_path_style(true);
        }
        let client = Client::from_conf(builder.build());

        let provider = S3Provider {
            client,
            bucket: config.s3.bucket.clone(),
            region: config.s3.region.clone(),
            endpoint: config.s3.endpoint.clone(),
            company_name: config.company_name.clone(),
            backup_prefix: config.backup_prefix.clone(),
        };
        provider.authenticate().await?;

        tracing::info!(
            bucket = %provider.bucket,
            region = %provider.region,
            "S3 provider initialized"
        );
        Ok(provider)
    }

    /// Object key for a file uploaded into a destination folder.
    fn object_key(destination: &str, file_name: &str) -> String {
        let folder = destination.trim_matches('/');
        if folder.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", folder, file_name)
        }
    }

    /// Zero-byte marker key that makes a folder visible in bucket browsers.
    fn folder_marker(folder_path: &str) -> String {
        format!("{}/", folder_path.trim_matches('/'))
    }

    fn object_url(&self, key: &str) -> String {
        match self.endpoint {
            Some(ref endpoint) => {
                format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key)
            }
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }
}

#[async_trait]
impl StorageProvider for S3Provider {
    async fn authenticate(&self) -> StorageResult<()> {
        self.client.list_buckets().send().await.map_err(|e| {
            StorageError::Auth(format!("S3 credential check failed: {}", e.into_service_error()))
        })?;
        Ok(())
    }

    async fn upload_file(&self, local_path: &Path, destination: &str) -> StorageResult<String> {
        let file_name = local_path
            .file_name()
            .ok_or_else(|| StorageError::Upload(format!("No file name: {}", local_path.display())))?
            .to_string_lossy()
            .into_owned();
        let key = Self::object_key(destination, &file_name);

        let size = fs::metadata(local_path).await.map(|m| m.len()).unwrap_or(0);
        let body = ByteStream::from_path(local_path).await.map_err(|e| {
            StorageError::Upload(format!("Failed to read {}: {}", local_path.display(), e))
        })?;

        let start = std::time::Instant::now();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let e = e.into_service_error();
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::Upload(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(key)
    }

    async fn download_file(&self, remote_id: &str, local_path: &Path) -> StorageResult<()> {
        let start = std::time::Instant::now();

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(remote_id)
            .send()
            .await
            .map_err(|e| {
                let e = e.into_service_error();
                if e.is_no_such_key() {
                    StorageError::NotFound(remote_id.to_string())
                } else {
                    tracing::error!(
                        error = %e,
                        bucket = %self.bucket,
                        key = %remote_id,
                        "S3 download failed"
                    );
                    StorageError::Download(e.to_string())
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Download(e.to_string()))?
            .into_bytes();
        fs::write(local_path, &data).await?;

        tracing::info!(
            bucket = %self.bucket,
            key = %remote_id,
            size_bytes = data.len() as u64,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(())
    }

    async fn list_files(&self, folder_path: &str) -> StorageResult<Vec<RemoteFileRecord>> {
        let prefix = if folder_path.is_empty() {
            String::new()
        } else {
            Self::folder_marker(folder_path)
        };

        let mut files = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .delimiter("/")
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                let e = e.into_service_error();
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    prefix = %prefix,
                    "S3 listing failed"
                );
                StorageError::Backend(e.to_string())
            })?;

            for object in page.contents() {
                let key = match object.key() {
                    Some(key) => key.to_string(),
                    None => continue,
                };
                // Folder markers share the prefix; they are not files.
                if key.ends_with('/') {
                    continue;
                }
                let name = key.rsplit('/').next().unwrap_or(&key).to_string();
                let modified = object
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or_else(Utc::now);

                files.push(RemoteFileRecord {
                    url: Some(self.object_url(&key)),
                    id: key,
                    name,
                    size: object.size().unwrap_or(0) as u64,
                    modified,
                });
            }
        }

        Ok(files)
    }

    async fn delete_file(&self, remote_id: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(remote_id)
            .send()
            .await
            .map_err(|e| {
                let e = e.into_service_error();
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %remote_id,
                    "S3 delete failed"
                );
                StorageError::Delete(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %remote_id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );
        Ok(())
    }

    async fn create_folder(&self, folder_path: &str) -> StorageResult<String> {
        let marker = Self::folder_marker(folder_path);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&marker)
            .body(ByteStream::from_static(b""))
            .send()
            .await
            .map_err(|e| StorageError::Folder(e.into_service_error().to_string()))?;

        Ok(marker.trim_end_matches('/').to_string())
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::S3
    }

    fn company_name(&self) -> &str {
        &self.company_name
    }

    fn backup_prefix(&self) -> &str {
        &self.backup_prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_joins_folder_and_name() {
        assert_eq!(S3Provider::object_key("Backups/daily", "b.zip"), "Backups/daily/b.zip");
        assert_eq!(S3Provider::object_key("", "b.zip"), "b.zip");
        assert_eq!(S3Provider::object_key("/Backups/", "b.zip"), "Backups/b.zip");
    }

    #[test]
    fn folder_marker_has_single_trailing_slash() {
        assert_eq!(S3Provider::folder_marker("Backups/daily"), "Backups/daily/");
        assert_eq!(S3Provider::folder_marker("Backups/daily/"), "Backups/daily/");
    }

    #[test]
    fn validate_config_rejects_missing_bucket() {
        let settings = S3Settings {
            bucket: String::new(),
            region: "us-east-1".to_string(),
            endpoint: None,
        };
        assert!(matches!(
            S3Provider::validate_config(&settings),
            Err(StorageError::Config(_))
        ));
    }
}
