use std::path::{Path, PathBuf};

use filekeeper_core::Config;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::report::RoutingReport;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Routes files out of the drop zone by extension.
///
/// A file only leaves the drop zone when its move is verified; anything
/// questionable stays put and is reported, never silently dropped. The one
/// exception is a byte-identical duplicate of a file already at the
/// destination, which is deleted.
pub struct FileRouter {
    config: Config,
}

impl FileRouter {
    pub fn new(config: Config) -> Self {
        FileRouter { config }
    }

    /// Route every file currently in the drop zone and report the outcome.
    /// A missing drop zone is created and yields an empty report.
    pub async fn route_all(&self) -> Result<RoutingReport, RouterError> {
        let dropzone = self.config.dropzone_dir();
        let mut report = RoutingReport::default();

        if !fs::try_exists(dropzone).await.unwrap_or(false) {
            fs::create_dir_all(dropzone).await?;
            tracing::info!(path = %dropzone.display(), "Created missing drop zone");
            return Ok(report);
        }

        let mut entries = fs::read_dir(dropzone).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();

            if is_hidden_or_system(&name) {
                report.skipped += 1;
                continue;
            }

            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                report.skipped += 1;
                continue;
            }
            if !file_type.is_file() {
                report
                    .warnings
                    .push(format!("{}: not a regular file, left in place", name));
                continue;
            }

            let path = entry.path();
            self.route_one(&path, &name, &mut report).await?;
        }

        tracing::info!(
            routed = report.routed,
            duplicates = report.duplicates,
            skipped = report.skipped,
            warnings = report.warnings.len(),
            errors = report.errors.len(),
            "Routing pass complete"
        );

        Ok(report)
    }

    async fn route_one(
        &self,
        path: &Path,
        name: &str,
        report: &mut RoutingReport,
    ) -> Result<(), RouterError> {
        let meta = match fs::metadata(path).await {
            Ok(meta) => meta,
            Err(_) => {
                // Disappeared between listing and processing.
                report
                    .warnings
                    .push(format!("{}: vanished before routing", name));
                return Ok(());
            }
        };
        let size = meta.len();
        if size == 0 {
            report
                .warnings
                .push(format!("{}: empty file, left in place", name));
            return Ok(());
        }

        let source_hash = match hash_file(path).await {
            Ok(hash) => hash,
            Err(e) => {
                report
                    .warnings
                    .push(format!("{}: unreadable ({}), left in place", name, e));
                return Ok(());
            }
        };

        let extension = dotted_extension(path);
        let dest_dir = match extension
            .as_deref()
            .and_then(|ext| self.config.routing_destination(ext))
        {
            Some(dir) => dir.to_path_buf(),
            None => self
                .config
                .folder_path("archive")
                .map_err(|e| RouterError::Config(e.to_string()))?
                .to_path_buf(),
        };
        fs::create_dir_all(&dest_dir).await?;

        if self
            .duplicate_exists(&dest_dir, extension.as_deref(), size, &source_hash)
            .await?
        {
            fs::remove_file(path).await?;
            report.duplicates += 1;
            tracing::info!(
                file = %name,
                destination = %dest_dir.display(),
                "Duplicate content already at destination, source removed"
            );
            return Ok(());
        }

        let dest_path = unique_destination(&dest_dir, Path::new(name)).await;
        if let Err(e) = move_file(path, &dest_path).await {
            report.errors.push(format!("{}: move failed ({})", name, e));
            report.failed_files.push(name.to_string());
            return Ok(());
        }

        // The file only counts as routed once it is verifiably in place.
        match verify_moved(path, &dest_path, size).await {
            Ok(()) => {
                report.routed += 1;
                tracing::info!(
                    file = %name,
                    destination = %dest_path.display(),
                    size_bytes = size,
                    "Routed"
                );
            }
            Err(detail) => {
                report.errors.push(format!("{}: {}", name, detail));
                report.failed_files.push(name.to_string());
            }
        }

        Ok(())
    }

    /// Whether a same-extension file with identical content already sits
    /// directly in `dest_dir`. Size is compared before hashing.
    async fn duplicate_exists(
        &self,
        dest_dir: &Path,
        extension: Option<&str>,
        size: u64,
        source_hash: &str,
    ) -> Result<bool, RouterError> {
        let mut entries = fs::read_dir(dest_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let candidate = entry.path();
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                Err(_) => continue,
            };
            if !meta.is_file() || meta.len() != size {
                continue;
            }
            if dotted_extension(&candidate).as_deref() != extension {
                continue;
            }
            match hash_file(&candidate).await {
                Ok(hash) if hash == source_hash => return Ok(true),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        file = %candidate.display(),
                        error = %e,
                        "Could not hash destination file during duplicate check"
                    );
                }
            }
        }
        Ok(false)
    }
}

/// Hidden and OS-metadata files never leave the drop zone.
fn is_hidden_or_system(name: &str) -> bool {
    name.starts_with('.') || name.starts_with("._") || name == "Thumbs.db" || name == "desktop.ini"
}

/// Lowercase extension with the leading dot, e.g. `.pdf`.
fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

/// First non-colliding destination: `name.ext`, then `name_1.ext`, ...
async fn unique_destination(dest_dir: &Path, file_name: &Path) -> PathBuf {
    let candidate = dest_dir.join(file_name);
    if !fs::try_exists(&candidate).await.unwrap_or(false) {
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
        if !fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        counter += 1;
    }
}

/// A move is only complete when the source is gone AND the destination holds
/// the expected bytes. The source check matters for the copy-and-delete
/// fallback, where the copy can land but the delete fail.
async fn verify_moved(source: &Path, dest: &Path, size: u64) -> Result<(), String> {
    if fs::try_exists(source).await.unwrap_or(true) {
        return Err("source still present after move".to_string());
    }
    match fs::metadata(dest).await {
        Ok(meta) if meta.len() == size => Ok(()),
        Ok(meta) => Err(format!(
            "size mismatch after move ({} != {} bytes)",
            meta.len(),
            size
        )),
        Err(e) => Err(format!("missing after move ({})", e)),
    }
}

/// Rename, falling back to copy-and-delete across filesystems.
async fn move_file(source: &Path, dest: &Path) -> std::io::Result<()> {
    match fs::rename(source, dest).await {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(source, dest).await?;
            fs::remove_file(source).await
        }
    }
}

/// SHA-256 of a file's contents, streamed in 8 KiB reads.
async fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filekeeper_core::ProviderKind;
    use tempfile::tempdir;

    fn test_config(base: &Path) -> Config {
        let config = Config::new("TestCo", ProviderKind::Local, base.to_path_buf());
        config.ensure_critical_folders().unwrap();
        config
    }

    async fn drop_file(config: &Config, name: &str, contents: &[u8]) -> PathBuf {
        let path = config.dropzone_dir().join(name);
        fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn routes_by_extension() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        drop_file(&config, "invoice.pdf", b"pdf bytes").await;
        drop_file(&config, "logo.png", b"png bytes").await;

        let report = FileRouter::new(config.clone()).route_all().await.unwrap();

        assert_eq!(report.routed, 2);
        assert!(report.is_clean());
        assert!(dir.path().join("00_Admin/invoice.pdf").exists());
        assert!(dir.path().join("01_Branding/logo.png").exists());
        assert!(!config.dropzone_dir().join("invoice.pdf").exists());
    }

    #[tokio::test]
    async fn unmapped_extension_goes_to_archive() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        drop_file(&config, "mystery.xyz", b"???").await;
        drop_file(&config, "no_extension", b"???").await;

        let report = FileRouter::new(config).route_all().await.unwrap();

        assert_eq!(report.routed, 2);
        assert!(dir.path().join("Z_Archive/mystery.xyz").exists());
        assert!(dir.path().join("Z_Archive/no_extension").exists());
    }

    #[tokio::test]
    async fn duplicate_content_removes_source() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        fs::write(dir.path().join("00_Admin/report.pdf"), b"same bytes")
            .await
            .unwrap();
        let source = drop_file(&config, "report_copy.pdf", b"same bytes").await;

        let report = FileRouter::new(config).route_all().await.unwrap();

        assert_eq!(report.duplicates, 1);
        assert_eq!(report.routed, 0);
        assert!(!source.exists());
        assert!(!dir.path().join("00_Admin/report_copy.pdf").exists());
    }

    #[tokio::test]
    async fn name_collision_with_different_content_gets_suffix() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        fs::write(dir.path().join("00_Admin/report.pdf"), b"old content")
            .await
            .unwrap();
        drop_file(&config, "report.pdf", b"new content").await;

        let report = FileRouter::new(config).route_all().await.unwrap();

        assert_eq!(report.routed, 1);
        assert!(dir.path().join("00_Admin/report.pdf").exists());
        assert!(dir.path().join("00_Admin/report_1.pdf").exists());
    }

    #[tokio::test]
    async fn same_bytes_different_extension_is_not_a_duplicate() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        fs::write(dir.path().join("Z_Archive/data.abc"), b"payload")
            .await
            .unwrap();
        drop_file(&config, "data.xyz", b"payload").await;

        let report = FileRouter::new(config).route_all().await.unwrap();

        assert_eq!(report.duplicates, 0);
        assert_eq!(report.routed, 1);
        assert!(dir.path().join("Z_Archive/data.xyz").exists());
    }

    #[tokio::test]
    async fn empty_and_hidden_files_stay_behind() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        let empty = drop_file(&config, "empty.pdf", b"").await;
        let hidden = drop_file(&config, ".DS_Store", b"junk").await;
        let apple_double = drop_file(&config, "._resource.pdf", b"junk").await;

        let report = FileRouter::new(config).route_all().await.unwrap();

        assert_eq!(report.routed, 0);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.warnings.len(), 1);
        assert!(empty.exists());
        assert!(hidden.exists());
        assert!(apple_double.exists());
    }

    #[tokio::test]
    async fn repeated_runs_on_empty_dropzone_are_noops() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let router = FileRouter::new(config);

        let first = router.route_all().await.unwrap();
        let second = router.route_all().await.unwrap();

        assert_eq!(first.total_processed(), 0);
        assert_eq!(second.total_processed(), 0);
        assert!(first.is_clean() && second.is_clean());
    }

    #[tokio::test]
    async fn missing_dropzone_is_created() {
        let dir = tempdir().unwrap();
        let config = Config::new("TestCo", ProviderKind::Local, dir.path().to_path_buf());

        let report = FileRouter::new(config.clone()).route_all().await.unwrap();

        assert!(report.is_clean());
        assert!(config.dropzone_dir().is_dir());
    }

    #[tokio::test]
    async fn move_verification_requires_source_gone_and_sizes_to_match() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.pdf");
        let dest = dir.path().join("b.pdf");
        fs::write(&dest, b"payload").await.unwrap();

        // Clean move: source absent, destination holds the expected bytes.
        assert!(verify_moved(&source, &dest, 7).await.is_ok());

        assert!(verify_moved(&source, &dest, 3)
            .await
            .unwrap_err()
            .contains("size mismatch"));

        // A leftover source means the delete half of a copy-and-delete
        // fallback failed, even though the destination looks right.
        fs::write(&source, b"payload").await.unwrap();
        assert!(verify_moved(&source, &dest, 7)
            .await
            .unwrap_err()
            .contains("still present"));
    }

    #[test]
    fn dotted_extension_is_lowercased() {
        assert_eq!(dotted_extension(Path::new("A.PDF")), Some(".pdf".to_string()));
        assert_eq!(dotted_extension(Path::new("archive.tar.GZ")), Some(".gz".to_string()));
        assert_eq!(dotted_extension(Path::new("README")), None);
    }
}
