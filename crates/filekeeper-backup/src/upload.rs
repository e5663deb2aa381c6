use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use filekeeper_core::{BestEffort, Config};
use filekeeper_storage::StorageProvider;

use crate::error::BackupError;
use crate::rotation::find_latest_bundle;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(30);
/// Remote copies kept per tier after a successful upload.
const MAX_REMOTE_BACKUPS: usize = 5;
const UPLOAD_TIER: &str = "daily";

/// Result of a completed upload run.
#[derive(Debug)]
pub struct UploadOutcome {
    pub bundle: PathBuf,
    pub remote_id: String,
    pub attempts: u32,
    /// Outcome of the post-upload remote pruning pass.
    pub prune: BestEffort,
}

/// Uploads the newest bundle with retries and prunes old remote copies.
///
/// A failed attempt is retried after a fixed delay; only when every attempt
/// fails does the run error out. Pruning failures never fail the run, since
/// the backup itself is already safe remotely.
pub struct BackupUploader {
    provider: Arc<dyn StorageProvider>,
    max_attempts: u32,
    retry_delay: Duration,
    max_remote_backups: usize,
}

impl BackupUploader {
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        BackupUploader {
            provider,
            max_attempts: MAX_ATTEMPTS,
            retry_delay: RETRY_DELAY,
            max_remote_backups: MAX_REMOTE_BACKUPS,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Find the newest bundle in the working folder and upload it.
    pub async fn upload_latest(&self, config: &Config) -> Result<UploadOutcome, BackupError> {
        let bundle = find_latest_bundle(config).await?;
        self.upload_bundle(&bundle).await
    }

    /// Upload one bundle into the daily tier.
    pub async fn upload_bundle(&self, bundle: &Path) -> Result<UploadOutcome, BackupError> {
        if !bundle.is_file() {
            return Err(BackupError::MissingBundle(bundle.to_path_buf()));
        }

        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            // Re-checked every attempt so a transiently expired session can
            // recover on a retry. A stale session is worth flagging, but the
            // upload attempt itself decides whether the run fails.
            if let Err(e) = self.provider.authenticate().await {
                tracing::warn!(
                    provider = %self.provider.kind(),
                    attempt,
                    error = %e,
                    "Authentication check failed"
                );
            }

            match self.provider.upload_backup(bundle, UPLOAD_TIER).await {
                Ok(remote_id) => {
                    let prune = self
                        .provider
                        .cleanup_old_backups(self.max_remote_backups, UPLOAD_TIER)
                        .await;
                    if !prune.is_complete() {
                        tracing::warn!(
                            errors = ?prune.errors(),
                            "Remote pruning did not finish cleanly"
                        );
                    }
                    return Ok(UploadOutcome {
                        bundle: bundle.to_path_buf(),
                        remote_id,
                        attempts: attempt,
                        prune,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Upload attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(BackupError::Storage(last_error.unwrap_or_else(|| {
            filekeeper_storage::StorageError::Upload("no attempts were made".to_string())
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filekeeper_core::ProviderKind;
    use filekeeper_storage::LocalProvider;
    use tempfile::tempdir;
    use tokio::fs;

    async fn setup(base: &Path) -> (Config, Arc<dyn StorageProvider>) {
        let config = Config::new("TestCo", ProviderKind::Local, base.to_path_buf());
        config.ensure_critical_folders().unwrap();
        let provider = LocalProvider::connect(&config).await.unwrap();
        (config, Arc::new(provider))
    }

    #[tokio::test]
    async fn uploads_latest_bundle_into_daily_tier() {
        let dir = tempdir().unwrap();
        let (config, provider) = setup(dir.path()).await;

        fs::write(
            config.backups_dir().join("TestCo_Backup_2026-08-01_0300.zip"),
            b"old",
        )
        .await
        .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        fs::write(
            config.backups_dir().join("TestCo_Backup_2026-08-02_0300.zip"),
            b"new",
        )
        .await
        .unwrap();

        let outcome = BackupUploader::new(provider.clone())
            .with_retry_delay(Duration::ZERO)
            .upload_latest(&config)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.prune, BestEffort::Complete);
        assert_eq!(
            outcome.remote_id,
            "TestCo_Backup/daily/TestCo_Backup_2026-08-02_0300.zip"
        );

        let remote = provider.list_files("TestCo_Backup/daily").await.unwrap();
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].name, "TestCo_Backup_2026-08-02_0300.zip");
    }

    #[tokio::test]
    async fn upload_prunes_remote_tier_to_cap() {
        let dir = tempdir().unwrap();
        let (config, provider) = setup(dir.path()).await;

        for i in 1..=6 {
            let bundle = dir
                .path()
                .join(format!("TestCo_Backup_2026-08-0{}_0300.zip", i));
            fs::write(&bundle, b"zip").await.unwrap();
            provider.upload_backup(&bundle, "daily").await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        let bundle = config.backups_dir().join("TestCo_Backup_2026-08-07_0300.zip");
        fs::write(&bundle, b"zip").await.unwrap();

        let outcome = BackupUploader::new(provider.clone())
            .with_retry_delay(Duration::ZERO)
            .upload_latest(&config)
            .await
            .unwrap();
        assert_eq!(outcome.prune, BestEffort::Complete);

        let remote = provider.list_files("TestCo_Backup/daily").await.unwrap();
        assert_eq!(remote.len(), MAX_REMOTE_BACKUPS);
    }

    #[tokio::test]
    async fn empty_backups_dir_yields_no_bundles_error() {
        let dir = tempdir().unwrap();
        let (config, provider) = setup(dir.path()).await;

        let result = BackupUploader::new(provider).upload_latest(&config).await;
        assert!(matches!(result, Err(BackupError::NoBundles(_))));
    }

    #[tokio::test]
    async fn zero_byte_latest_bundle_never_reaches_the_provider() {
        let dir = tempdir().unwrap();
        let (config, provider) = setup(dir.path()).await;

        fs::write(
            config.backups_dir().join("TestCo_Backup_2026-08-01_0300.zip"),
            b"",
        )
        .await
        .unwrap();

        let result = BackupUploader::new(provider.clone())
            .upload_latest(&config)
            .await;
        assert!(matches!(result, Err(BackupError::EmptyBundle(_))));

        let remote = provider.list_files("TestCo_Backup/daily").await.unwrap();
        assert!(remote.is_empty());
    }

    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use filekeeper_storage::{RemoteFileRecord, StorageError, StorageResult};

    /// Authentication always fails; uploads fail until the given attempt.
    struct FlakyProvider {
        auth_calls: AtomicU32,
        upload_calls: AtomicU32,
        succeed_on: u32,
    }

    #[async_trait]
    impl StorageProvider for FlakyProvider {
        async fn authenticate(&self) -> StorageResult<()> {
            self.auth_calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Auth("session expired".to_string()))
        }
        async fn upload_file(&self, _: &Path, _: &str) -> StorageResult<String> {
            let call = self.upload_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeed_on {
                Ok(format!("remote-{}", call))
            } else {
                Err(StorageError::Upload("connection reset".to_string()))
            }
        }
        async fn download_file(&self, _: &str, _: &Path) -> StorageResult<()> {
            Ok(())
        }
        async fn list_files(&self, _: &str) -> StorageResult<Vec<RemoteFileRecord>> {
            Ok(Vec::new())
        }
        async fn delete_file(&self, _: &str) -> StorageResult<()> {
            Ok(())
        }
        async fn create_folder(&self, path: &str) -> StorageResult<String> {
            Ok(path.to_string())
        }
        fn kind(&self) -> ProviderKind {
            ProviderKind::Local
        }
        fn company_name(&self) -> &str {
            "TestCo"
        }
        fn backup_prefix(&self) -> &str {
            "TestCo_Backup"
        }
    }

    #[tokio::test]
    async fn session_is_rechecked_on_every_attempt_and_auth_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let bundle = dir.path().join("TestCo_Backup_2026-08-01_0300.zip");
        fs::write(&bundle, b"zip").await.unwrap();

        let provider = Arc::new(FlakyProvider {
            auth_calls: AtomicU32::new(0),
            upload_calls: AtomicU32::new(0),
            succeed_on: 3,
        });

        let outcome = BackupUploader::new(provider.clone())
            .with_retry_delay(Duration::ZERO)
            .upload_bundle(&bundle)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 3);
        // One authentication check per attempt, none of them fatal.
        assert_eq!(provider.auth_calls.load(Ordering::SeqCst), 3);
        assert_eq!(provider.upload_calls.load(Ordering::SeqCst), 3);
    }
}
