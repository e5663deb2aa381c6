#[cfg(feature = "storage-dropbox")]
use crate::DropboxProvider;
#[cfg(feature = "storage-gdrive")]
use crate::GoogleDriveProvider;
#[cfg(feature = "storage-local")]
use crate::LocalProvider;
#[cfg(feature = "storage-s3")]
use crate::S3Provider;
use crate::{StorageError, StorageProvider, StorageResult};
use filekeeper_core::{Config, ProviderKind};
use std::sync::Arc;

/// Construct the storage provider the configuration names.
///
/// Each variant validates its settings and performs its connection check
/// before being returned, so a provider handed out by the factory is ready to
/// use.
pub async fn create_provider(config: &Config) -> StorageResult<Arc<dyn StorageProvider>> {
    match config.provider {
        #[cfg(feature = "storage-local")]
        ProviderKind::Local => {
            let provider = LocalProvider::connect(config).await?;
            Ok(Arc::new(provider))
        }

        #[cfg(not(feature = "storage-local"))]
        ProviderKind::Local => Err(StorageError::Config(
            "Local provider not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-s3")]
        ProviderKind::S3 => {
            let provider = S3Provider::connect(config).await?;
            Ok(Arc::new(provider))
        }

        #[cfg(not(feature = "storage-s3"))]
        ProviderKind::S3 => Err(StorageError::Config(
            "S3 provider not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-dropbox")]
        ProviderKind::Dropbox => {
            let provider = DropboxProvider::connect(config).await?;
            Ok(Arc::new(provider))
        }

        #[cfg(not(feature = "storage-dropbox"))]
        ProviderKind::Dropbox => Err(StorageError::Config(
            "Dropbox provider not available (storage-dropbox feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-gdrive")]
        ProviderKind::GoogleDrive => {
            let provider = GoogleDriveProvider::connect(config).await?;
            Ok(Arc::new(provider))
        }

        #[cfg(not(feature = "storage-gdrive"))]
        ProviderKind::GoogleDrive => Err(StorageError::Config(
            "Google Drive provider not available (storage-gdrive feature not enabled)".to_string(),
        )),
    }
}
