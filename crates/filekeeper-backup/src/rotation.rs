use std::path::{Path, PathBuf};
use std::time::SystemTime;

use filekeeper_core::{BestEffort, Config};
use tokio::fs;

use crate::error::BackupError;

/// What a rotation pass did, plus its best-effort outcome.
#[derive(Debug)]
pub struct RotationSummary {
    /// Bundles moved from the working tier into the archive tier.
    pub archived: usize,
    /// Old archive bundles deleted to honor the retention cap.
    pub pruned: usize,
    /// Moves skipped because the archive already held that file name.
    pub skipped: usize,
    pub outcome: BestEffort,
}

/// Bundles in `dir` matching the configured prefix, newest first.
async fn bundles_newest_first(
    dir: &Path,
    prefix: &str,
) -> Result<Vec<(PathBuf, SystemTime)>, BackupError> {
    let mut bundles = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(prefix) || !name.ends_with(".zip") {
            continue;
        }
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        bundles.push((entry.path(), modified));
    }
    bundles.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(bundles)
}

/// Newest bundle in the working backup folder.
///
/// Missing folder, no bundles at all, and a zero-byte newest bundle are
/// three distinct errors; a truncated archive must never reach an uploader.
pub async fn find_latest_bundle(config: &Config) -> Result<PathBuf, BackupError> {
    let backups = config.backups_dir();
    if !backups.is_dir() {
        return Err(BackupError::MissingDirectory(backups.to_path_buf()));
    }

    let bundles = bundles_newest_first(backups, &config.backup_prefix).await?;
    let (path, _) = bundles
        .into_iter()
        .next()
        .ok_or_else(|| BackupError::NoBundles(backups.to_path_buf()))?;

    if fs::metadata(&path).await?.len() == 0 {
        return Err(BackupError::EmptyBundle(path));
    }
    Ok(path)
}

/// Two-tier rotation: keep the newest `max_working_backups` bundles in the
/// working folder, move the rest into the archive tier, then prune the
/// archive down to `max_archive_backups`.
///
/// Individual move or delete failures are collected, not fatal; a bundle
/// whose name already exists in the archive is skipped so an existing archive
/// copy is never clobbered.
pub async fn rotate_bundles(config: &Config) -> Result<RotationSummary, BackupError> {
    let backups = config.backups_dir();
    if !backups.is_dir() {
        return Err(BackupError::MissingDirectory(backups.to_path_buf()));
    }
    let archive = config.archive_backups_dir();
    fs::create_dir_all(&archive).await?;

    let mut summary = RotationSummary {
        archived: 0,
        pruned: 0,
        skipped: 0,
        outcome: BestEffort::Complete,
    };
    let mut errors = Vec::new();

    let working = bundles_newest_first(backups, &config.backup_prefix).await?;
    for (path, _) in working.iter().skip(config.max_working_backups) {
        let name = match path.file_name() {
            Some(name) => name.to_os_string(),
            None => continue,
        };
        let target = archive.join(&name);
        if fs::try_exists(&target).await.unwrap_or(false) {
            tracing::warn!(
                bundle = %name.to_string_lossy(),
                "Archive already holds this bundle, leaving the working copy"
            );
            summary.skipped += 1;
            continue;
        }
        match fs::rename(path, &target).await {
            Ok(()) => {
                summary.archived += 1;
                tracing::info!(bundle = %name.to_string_lossy(), "Archived bundle");
            }
            Err(e) => {
                tracing::warn!(
                    bundle = %name.to_string_lossy(),
                    error = %e,
                    "Could not archive bundle"
                );
                errors.push(format!("{}: {}", name.to_string_lossy(), e));
            }
        }
    }

    let archived = bundles_newest_first(&archive, &config.backup_prefix).await?;
    for (path, _) in archived.iter().skip(config.max_archive_backups) {
        match fs::remove_file(path).await {
            Ok(()) => {
                summary.pruned += 1;
                tracing::info!(bundle = %path.display(), "Pruned archived bundle");
            }
            Err(e) => {
                tracing::warn!(bundle = %path.display(), error = %e, "Could not prune bundle");
                errors.push(format!("{}: {}", path.display(), e));
            }
        }
    }

    summary.outcome = BestEffort::from_errors(errors);
    tracing::info!(
        archived = summary.archived,
        pruned = summary.pruned,
        skipped = summary.skipped,
        complete = summary.outcome.is_complete(),
        "Rotation pass complete"
    );
    Ok(summary)
}
