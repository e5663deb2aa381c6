use filekeeper_core::Config;
use tokio::process::Command;

use crate::error::BackupError;

/// Mirror the configured source tree into the base directory with
/// `rsync -a --delete`.
///
/// `--delete` makes the base directory an exact replica: files removed at the
/// source disappear from the mirror too. The configured bundle exclude
/// patterns are skipped on both sides so backup artifacts never ping-pong
/// between the trees.
pub async fn mirror_tree(config: &Config) -> Result<(), BackupError> {
    let source = config
        .mirror_source
        .as_ref()
        .ok_or_else(|| BackupError::SyncFailed("mirror source is not configured".to_string()))?;
    if !source.is_dir() {
        return Err(BackupError::MissingDirectory(source.clone()));
    }
    if !config.base_dir.is_dir() {
        return Err(BackupError::MissingDirectory(config.base_dir.clone()));
    }

    // Trailing slash: sync the contents of source, not the folder itself.
    let mut source_arg = source.as_os_str().to_os_string();
    source_arg.push("/");

    let mut command = Command::new("rsync");
    command.arg("-a").arg("--delete");
    for pattern in &config.exclude_patterns {
        command.arg(format!("--exclude={}", pattern));
    }
    command.arg(&source_arg).arg(&config.base_dir);

    let start = std::time::Instant::now();
    let output = command.output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BackupError::SyncMissing
        } else {
            BackupError::Io(e)
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(BackupError::SyncFailed(format!(
            "{} ({})",
            stderr, output.status
        )));
    }

    tracing::info!(
        source = %source.display(),
        destination = %config.base_dir.display(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Mirror sync complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filekeeper_core::ProviderKind;
    use tempfile::tempdir;

    async fn rsync_available() -> bool {
        Command::new("rsync").arg("--version").output().await.is_ok()
    }

    #[tokio::test]
    async fn unconfigured_source_is_an_error() {
        let dir = tempdir().unwrap();
        let config = Config::new("TestCo", ProviderKind::Local, dir.path().to_path_buf());

        let result = mirror_tree(&config).await;
        assert!(matches!(result, Err(BackupError::SyncFailed(_))));
    }

    #[tokio::test]
    async fn missing_source_dir_is_an_error() {
        let dir = tempdir().unwrap();
        let mut config = Config::new("TestCo", ProviderKind::Local, dir.path().to_path_buf());
        config.mirror_source = Some(dir.path().join("never_created"));

        let result = mirror_tree(&config).await;
        assert!(matches!(result, Err(BackupError::MissingDirectory(_))));
    }

    #[tokio::test]
    async fn mirror_replicates_source_and_removes_extraneous_files() {
        if !rsync_available().await {
            return;
        }

        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        let base = dir.path().join("base");
        std::fs::create_dir_all(source.join("02_Projects")).unwrap();
        std::fs::create_dir_all(&base).unwrap();

        std::fs::write(source.join("02_Projects/site.geojson"), b"{}").unwrap();
        std::fs::write(base.join("stale.txt"), b"gone after sync").unwrap();

        let mut config = Config::new("TestCo", ProviderKind::Local, base.clone());
        config.mirror_source = Some(source);

        mirror_tree(&config).await.unwrap();

        assert!(base.join("02_Projects/site.geojson").exists());
        assert!(!base.join("stale.txt").exists());
    }
}
