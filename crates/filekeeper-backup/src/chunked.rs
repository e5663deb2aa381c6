use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use filekeeper_storage::StorageProvider;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::error::BackupError;

/// Chunk payload size for resumable uploads.
pub const CHUNK_SIZE: u64 = 50 * 1024 * 1024;

const STATE_SCHEMA_VERSION: u32 = 1;
const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(30);

/// Persistent progress record for a chunked upload.
///
/// Written next to the bundle after every confirmed chunk and deleted only
/// once the whole file is uploaded. The `file_path`/`file_size` pair ties the
/// record to one specific bundle; a record that does not match the bundle on
/// disk is stale and gets discarded.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadState {
    pub schema_version: u32,
    pub file_path: PathBuf,
    pub file_size: u64,
    pub uploaded_chunks: BTreeSet<u64>,
    pub updated_at: DateTime<Utc>,
}

impl UploadState {
    fn new(file_path: PathBuf, file_size: u64) -> Self {
        UploadState {
            schema_version: STATE_SCHEMA_VERSION,
            file_path,
            file_size,
            uploaded_chunks: BTreeSet::new(),
            updated_at: Utc::now(),
        }
    }

    fn matches(&self, file_path: &Path, file_size: u64) -> bool {
        self.schema_version == STATE_SCHEMA_VERSION
            && self.file_path == file_path
            && self.file_size == file_size
    }
}

/// What a chunked upload run did.
#[derive(Debug)]
pub struct ChunkedOutcome {
    pub total_chunks: u64,
    /// Chunks uploaded during this run.
    pub uploaded: u64,
    /// Chunks skipped because a state file already recorded them.
    pub resumed: u64,
    pub destination: String,
}

/// Resumable uploader for bundles too large for one reliable transfer.
///
/// The bundle is split into fixed-size chunks uploaded one by one into a
/// `chunks/{bundle_name}` folder under the backup prefix. Progress survives
/// interruption through the state file, so a re-run picks up where the last
/// one stopped instead of resending everything.
pub struct ChunkedUploader {
    provider: Arc<dyn StorageProvider>,
    chunk_size: u64,
    max_attempts: u32,
    retry_delay: Duration,
}

impl ChunkedUploader {
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        ChunkedUploader {
            provider,
            chunk_size: CHUNK_SIZE,
            max_attempts: MAX_ATTEMPTS,
            retry_delay: RETRY_DELAY,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sidecar state file for a bundle.
    pub fn state_path(bundle: &Path) -> PathBuf {
        let mut name = bundle
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(".upload_state");
        bundle.with_file_name(name)
    }

    async fn load_state(bundle: &Path, file_size: u64) -> UploadState {
        let path = Self::state_path(bundle);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(_) => return UploadState::new(bundle.to_path_buf(), file_size),
        };
        match serde_json::from_str::<UploadState>(&raw) {
            Ok(state) if state.matches(bundle, file_size) => {
                tracing::info!(
                    chunks_done = state.uploaded_chunks.len(),
                    "Resuming chunked upload from state file"
                );
                state
            }
            Ok(_) => {
                tracing::warn!(
                    state = %path.display(),
                    "State file belongs to a different bundle, starting over"
                );
                UploadState::new(bundle.to_path_buf(), file_size)
            }
            Err(e) => {
                tracing::warn!(
                    state = %path.display(),
                    error = %e,
                    "State file is unreadable, starting over"
                );
                UploadState::new(bundle.to_path_buf(), file_size)
            }
        }
    }

    async fn save_state(bundle: &Path, state: &UploadState) -> Result<(), BackupError> {
        let body = serde_json::to_vec_pretty(state)
            .map_err(|e| BackupError::State(e.to_string()))?;
        fs::write(Self::state_path(bundle), body).await?;
        Ok(())
    }

    /// Upload one chunk with per-chunk retries. The chunk bytes are staged in
    /// a temp file next to the bundle because providers upload by path.
    async fn upload_chunk(
        &self,
        bundle: &Path,
        chunk: &[u8],
        index: u64,
        destination: &str,
    ) -> Result<(), BackupError> {
        let chunk_name = format!(
            "{}.chunk_{:05}",
            bundle
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            index
        );
        let chunk_path = bundle.with_file_name(&chunk_name);
        fs::write(&chunk_path, chunk).await?;

        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            match self.provider.upload_file(&chunk_path, destination).await {
                Ok(_) => {
                    last_error = None;
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        chunk = index,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Chunk upload attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        let _ = fs::remove_file(&chunk_path).await;
        match last_error {
            None => Ok(()),
            Some(e) => Err(BackupError::Storage(e)),
        }
    }

    /// Upload a bundle in chunks, resuming from the state file if one
    /// matches. The state file is removed only after every chunk is
    /// confirmed.
    pub async fn upload(&self, bundle: &Path) -> Result<ChunkedOutcome, BackupError> {
        let meta = fs::metadata(bundle)
            .await
            .map_err(|_| BackupError::MissingBundle(bundle.to_path_buf()))?;
        let file_size = meta.len();
        if file_size == 0 {
            return Err(BackupError::EmptyBundle(bundle.to_path_buf()));
        }

        let bundle_name = bundle
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let total_chunks = file_size.div_ceil(self.chunk_size);
        let destination = format!("{}/chunks/{}", self.provider.backup_prefix(), bundle_name);

        let mut state = Self::load_state(bundle, file_size).await;
        let resumed = state.uploaded_chunks.len() as u64;

        tracing::info!(
            bundle = %bundle.display(),
            size_bytes = file_size,
            total_chunks,
            resumed,
            destination = %destination,
            "Starting chunked upload"
        );

        let mut file = fs::File::open(bundle).await?;
        let mut uploaded = 0u64;
        let start = std::time::Instant::now();

        for index in 0..total_chunks {
            if state.uploaded_chunks.contains(&index) {
                continue;
            }

            let offset = index * self.chunk_size;
            let expected = self.chunk_size.min(file_size - offset) as usize;
            let mut chunk = vec![0u8; expected];
            file.seek(SeekFrom::Start(offset)).await?;
            file.read_exact(&mut chunk).await?;

            if let Err(e) = self.upload_chunk(bundle, &chunk, index, &destination).await {
                // Keep the state file so a re-run resumes from here.
                Self::save_state(bundle, &state).await?;
                return Err(e);
            }

            state.uploaded_chunks.insert(index);
            state.updated_at = Utc::now();
            Self::save_state(bundle, &state).await?;
            uploaded += 1;

            tracing::info!(
                chunk = index + 1,
                total_chunks,
                "Chunk uploaded"
            );
        }

        fs::remove_file(Self::state_path(bundle)).await.ok();

        tracing::info!(
            bundle = %bundle_name,
            total_chunks,
            uploaded,
            resumed,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Chunked upload complete"
        );

        Ok(ChunkedOutcome {
            total_chunks,
            uploaded,
            resumed,
            destination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use filekeeper_core::{Config, ProviderKind};
    use filekeeper_storage::{LocalProvider, RemoteFileRecord, StorageError, StorageResult};
    use tempfile::tempdir;

    async fn setup(base: &Path) -> (Config, Arc<LocalProvider>) {
        let config = Config::new("TestCo", ProviderKind::Local, base.to_path_buf());
        config.ensure_critical_folders().unwrap();
        let provider = LocalProvider::connect(&config).await.unwrap();
        (config, Arc::new(provider))
    }

    async fn remote_chunk_names(provider: &LocalProvider, bundle_name: &str) -> Vec<String> {
        let folder = format!("TestCo_Backup/chunks/{}", bundle_name);
        let mut names: Vec<String> = provider
            .list_files(&folder)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn splits_bundle_into_chunks_and_clears_state() {
        let dir = tempdir().unwrap();
        let (_config, provider) = setup(dir.path()).await;

        let bundle = dir.path().join("TestCo_Backup_2026-08-01_0300.zip");
        fs::write(&bundle, b"0123456789").await.unwrap();

        let outcome = ChunkedUploader::new(provider.clone())
            .with_chunk_size(4)
            .with_retry_delay(Duration::ZERO)
            .upload(&bundle)
            .await
            .unwrap();

        assert_eq!(outcome.total_chunks, 3);
        assert_eq!(outcome.uploaded, 3);
        assert_eq!(outcome.resumed, 0);

        let names = remote_chunk_names(&provider, "TestCo_Backup_2026-08-01_0300.zip").await;
        assert_eq!(
            names,
            vec![
                "TestCo_Backup_2026-08-01_0300.zip.chunk_00000",
                "TestCo_Backup_2026-08-01_0300.zip.chunk_00001",
                "TestCo_Backup_2026-08-01_0300.zip.chunk_00002",
            ]
        );
        assert!(!ChunkedUploader::state_path(&bundle).exists());
    }

    #[tokio::test]
    async fn resumes_from_matching_state_file() {
        let dir = tempdir().unwrap();
        let (_config, provider) = setup(dir.path()).await;

        let bundle = dir.path().join("TestCo_Backup_2026-08-01_0300.zip");
        fs::write(&bundle, b"0123456789").await.unwrap();

        let mut state = UploadState::new(bundle.clone(), 10);
        state.uploaded_chunks.insert(0);
        state.uploaded_chunks.insert(1);
        fs::write(
            ChunkedUploader::state_path(&bundle),
            serde_json::to_vec(&state).unwrap(),
        )
        .await
        .unwrap();

        let outcome = ChunkedUploader::new(provider.clone())
            .with_chunk_size(4)
            .with_retry_delay(Duration::ZERO)
            .upload(&bundle)
            .await
            .unwrap();

        assert_eq!(outcome.resumed, 2);
        assert_eq!(outcome.uploaded, 1);

        // Only the missing chunk went over the wire.
        let names = remote_chunk_names(&provider, "TestCo_Backup_2026-08-01_0300.zip").await;
        assert_eq!(names, vec!["TestCo_Backup_2026-08-01_0300.zip.chunk_00002"]);
        assert!(!ChunkedUploader::state_path(&bundle).exists());
    }

    #[tokio::test]
    async fn mismatched_state_file_is_discarded() {
        let dir = tempdir().unwrap();
        let (_config, provider) = setup(dir.path()).await;

        let bundle = dir.path().join("TestCo_Backup_2026-08-01_0300.zip");
        fs::write(&bundle, b"0123456789").await.unwrap();

        // Same path, wrong size: recorded progress is for another bundle.
        let mut state = UploadState::new(bundle.clone(), 9999);
        state.uploaded_chunks.insert(0);
        fs::write(
            ChunkedUploader::state_path(&bundle),
            serde_json::to_vec(&state).unwrap(),
        )
        .await
        .unwrap();

        let outcome = ChunkedUploader::new(provider.clone())
            .with_chunk_size(4)
            .with_retry_delay(Duration::ZERO)
            .upload(&bundle)
            .await
            .unwrap();

        assert_eq!(outcome.resumed, 0);
        assert_eq!(outcome.uploaded, 3);
    }

    struct FailingProvider;

    #[async_trait]
    impl filekeeper_storage::StorageProvider for FailingProvider {
        async fn authenticate(&self) -> StorageResult<()> {
            Ok(())
        }
        async fn upload_file(&self, _: &Path, _: &str) -> StorageResult<String> {
            Err(StorageError::Upload("simulated outage".to_string()))
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
    async fn failed_run_keeps_state_file_for_resume() {
        let dir = tempdir().unwrap();
        let bundle = dir.path().join("TestCo_Backup_2026-08-01_0300.zip");
        fs::write(&bundle, b"0123456789").await.unwrap();

        let result = ChunkedUploader::new(Arc::new(FailingProvider))
            .with_chunk_size(4)
            .with_retry_delay(Duration::ZERO)
            .upload(&bundle)
            .await;

        assert!(matches!(result, Err(BackupError::Storage(_))));
        assert!(ChunkedUploader::state_path(&bundle).exists());
        // The staged chunk temp file was cleaned up after the failure.
        assert!(!bundle
            .with_file_name("TestCo_Backup_2026-08-01_0300.zip.chunk_00000")
            .exists());
    }

    #[tokio::test]
    async fn empty_bundle_is_rejected() {
        let dir = tempdir().unwrap();
        let (_config, provider) = setup(dir.path()).await;

        let bundle = dir.path().join("TestCo_Backup_2026-08-01_0300.zip");
        fs::write(&bundle, b"").await.unwrap();

        let result = ChunkedUploader::new(provider).upload(&bundle).await;
        assert!(matches!(result, Err(BackupError::EmptyBundle(_))));
    }
}
