use std::path::PathBuf;

use chrono::{DateTime, Local};
use filekeeper_core::Config;
use tokio::fs;
use tokio::process::Command;

use crate::error::BackupError;

/// Bundle file name for a prefix and creation time, minute resolution.
fn bundle_file_name(prefix: &str, timestamp: DateTime<Local>) -> String {
    format!("{}_{}.zip", prefix, timestamp.format("%Y-%m-%d_%H%M"))
}

/// Create a timestamped zip bundle of the base directory in the working
/// backup folder and return its path.
///
/// The archive is produced by the external `zip` tool with the configured
/// exclude patterns, so the working backups themselves and the drop zone
/// never end up inside a bundle. An undersized bundle is a warning, not an
/// error: a small tree legitimately produces a small archive.
pub async fn create_bundle(config: &Config) -> Result<PathBuf, BackupError> {
    let base = &config.base_dir;
    if !base.is_dir() {
        return Err(BackupError::MissingDirectory(base.clone()));
    }

    let backups = config.backups_dir().to_path_buf();
    fs::create_dir_all(&backups).await?;

    let name = bundle_file_name(&config.backup_prefix, Local::now());
    let dest = backups.join(&name);

    let mut command = Command::new("zip");
    command
        .arg("-r")
        .arg("-q")
        .arg(&dest)
        .arg(".")
        .current_dir(base);
    if !config.exclude_patterns.is_empty() {
        command.arg("-x");
        for pattern in &config.exclude_patterns {
            command.arg(pattern);
        }
    }

    let start = std::time::Instant::now();
    let output = command.output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BackupError::ArchiverMissing
        } else {
            BackupError::Io(e)
        }
    })?;

    if !output.status.success() {
        // Leave no half-written archive behind.
        let _ = fs::remove_file(&dest).await;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(BackupError::ArchiverFailed(format!(
            "{} ({})",
            stderr, output.status
        )));
    }

    let size = fs::metadata(&dest).await?.len();
    if size == 0 {
        let _ = fs::remove_file(&dest).await;
        return Err(BackupError::EmptyBundle(dest));
    }
    if size < config.min_backup_size_bytes {
        tracing::warn!(
            bundle = %dest.display(),
            size_bytes = size,
            minimum_bytes = config.min_backup_size_bytes,
            "Bundle is smaller than the expected minimum"
        );
    }

    tracing::info!(
        bundle = %dest.display(),
        size_bytes = size,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Bundle created"
    );

    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use filekeeper_core::ProviderKind;
    use tempfile::tempdir;

    async fn zip_available() -> bool {
        Command::new("zip").arg("-v").output().await.is_ok()
    }

    #[test]
    fn bundle_name_has_minute_resolution_timestamp() {
        let when = Local.with_ymd_and_hms(2026, 8, 23, 14, 5, 59).unwrap();
        assert_eq!(
            bundle_file_name("TestCo_Backup", when),
            "TestCo_Backup_2026-08-23_1405.zip"
        );
    }

    #[tokio::test]
    async fn missing_base_dir_is_an_error() {
        let dir = tempdir().unwrap();
        let config = Config::new(
            "TestCo",
            ProviderKind::Local,
            dir.path().join("never_created"),
        );

        let result = create_bundle(&config).await;
        assert!(matches!(result, Err(BackupError::MissingDirectory(_))));
    }

    #[tokio::test]
    async fn bundle_lands_in_backups_dir_and_skips_excluded_trees() {
        if !zip_available().await {
            return;
        }

        let dir = tempdir().unwrap();
        let mut config = Config::new("TestCo", ProviderKind::Local, dir.path().to_path_buf());
        config.min_backup_size_bytes = 0;
        config.ensure_critical_folders().unwrap();

        std::fs::write(dir.path().join("02_Projects/site.geojson"), b"{}").unwrap();
        std::fs::write(
            config.dropzone_dir().join("pending.pdf"),
            b"should not be bundled",
        )
        .unwrap();

        let bundle = create_bundle(&config).await.unwrap();

        assert!(bundle.starts_with(config.backups_dir()));
        let name = bundle.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("TestCo_Backup_"));
        assert!(name.ends_with(".zip"));
        assert!(std::fs::metadata(&bundle).unwrap().len() > 0);

        let listing = Command::new("unzip")
            .arg("-l")
            .arg(&bundle)
            .output()
            .await;
        if let Ok(listing) = listing {
            let text = String::from_utf8_lossy(&listing.stdout).to_string();
            assert!(text.contains("site.geojson"));
            assert!(!text.contains("pending.pdf"));
        }
    }
}
