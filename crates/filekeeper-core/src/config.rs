//! Configuration module
//!
//! Builds the immutable runtime configuration for all Filekeeper components:
//! company identity, the active storage provider and its settings, the
//! critical-folder map, the extension routing table, and backup retention
//! numbers. The configuration is constructed once at startup (from environment
//! variables) and passed by reference into every component; "reconfigure"
//! operations produce a new value instead of mutating shared state.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::provider_kind::ProviderKind;

const DEFAULT_COMPANY: &str = "Filekeeper";
const DEFAULT_MAX_WORKING_BACKUPS: usize = 1;
const DEFAULT_MAX_ARCHIVE_BACKUPS: usize = 4;
const DEFAULT_MIN_BACKUP_SIZE_BYTES: u64 = 3 * 1024 * 1024 * 1024; // 3 GiB

/// Local-disk provider settings.
#[derive(Clone, Debug)]
pub struct LocalSettings {
    /// Root directory the provider stores files under.
    pub storage_path: PathBuf,
}

/// Object-store (S3-compatible) provider settings.
#[derive(Clone, Debug)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, Spaces, ...).
    pub endpoint: Option<String>,
}

/// Folder-sync (Dropbox-style) provider settings.
#[derive(Clone, Debug)]
pub struct DropboxSettings {
    /// File holding the access token produced by the interactive token setup.
    pub token_path: PathBuf,
}

/// OAuth document-store (Drive-style) provider settings.
#[derive(Clone, Debug)]
pub struct DriveSettings {
    /// OAuth client secrets downloaded from the provider console.
    pub credentials_path: PathBuf,
    /// Token file written by the interactive browser flow.
    pub token_path: PathBuf,
    /// Folder id uploads are rooted under; `root` when unset.
    pub root_folder_id: String,
}

/// Application configuration. Immutable per run.
#[derive(Clone, Debug)]
pub struct Config {
    pub company_name: String,
    pub backup_prefix: String,
    pub provider: ProviderKind,
    /// Primary working directory everything else hangs off.
    pub base_dir: PathBuf,
    /// Optional source tree mirrored into `base_dir` by the sync operation.
    pub mirror_source: Option<PathBuf>,
    /// Folder key → absolute path. Single source of truth for destinations.
    pub critical_folders: BTreeMap<String, PathBuf>,
    /// Lowercase dotted extension → folder key.
    pub routing_rules: BTreeMap<String, String>,
    pub max_working_backups: usize,
    pub max_archive_backups: usize,
    pub min_backup_size_bytes: u64,
    /// Glob patterns excluded from bundles (passed to the archiver).
    pub exclude_patterns: Vec<String>,
    pub local: LocalSettings,
    pub s3: S3Settings,
    pub dropbox: DropboxSettings,
    pub drive: DriveSettings,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// `FILEKEEPER_BASE` sets the base directory, `FILEKEEPER_PROVIDER` the
    /// storage backend, `FILEKEEPER_COMPANY` the company name. Everything else
    /// has a provider-specific variable with a sensible default relative to the
    /// base directory.
    pub fn from_env() -> Result<Self> {
        let company = env::var("FILEKEEPER_COMPANY").unwrap_or_else(|_| DEFAULT_COMPANY.into());
        let provider = env::var("FILEKEEPER_PROVIDER")
            .unwrap_or_else(|_| "local".into())
            .parse::<ProviderKind>()?;
        let base_dir = PathBuf::from(
            env::var("FILEKEEPER_BASE").unwrap_or_else(|_| format!("/srv/{}", company)),
        );

        let mut config = Config::new(&company, provider, base_dir);

        if let Ok(source) = env::var("FILEKEEPER_MIRROR_SOURCE") {
            config.mirror_source = Some(PathBuf::from(source));
        }
        if let Ok(prefix) = env::var("FILEKEEPER_BACKUP_PREFIX") {
            config.backup_prefix = prefix;
        }
        if let Ok(n) = env::var("FILEKEEPER_MAX_WORKING_BACKUPS") {
            config.max_working_backups = n
                .parse()
                .context("FILEKEEPER_MAX_WORKING_BACKUPS must be an integer")?;
        }
        if let Ok(n) = env::var("FILEKEEPER_MAX_ARCHIVE_BACKUPS") {
            config.max_archive_backups = n
                .parse()
                .context("FILEKEEPER_MAX_ARCHIVE_BACKUPS must be an integer")?;
        }
        if let Ok(n) = env::var("FILEKEEPER_MIN_BACKUP_SIZE_BYTES") {
            config.min_backup_size_bytes = n
                .parse()
                .context("FILEKEEPER_MIN_BACKUP_SIZE_BYTES must be an integer")?;
        }

        if let Ok(path) = env::var("FILEKEEPER_LOCAL_STORAGE_PATH") {
            config.local.storage_path = PathBuf::from(path);
        }
        if let Ok(bucket) = env::var("FILEKEEPER_S3_BUCKET") {
            config.s3.bucket = bucket;
        }
        if let Ok(region) = env::var("FILEKEEPER_S3_REGION") {
            config.s3.region = region;
        }
        if let Ok(endpoint) = env::var("FILEKEEPER_S3_ENDPOINT") {
            config.s3.endpoint = Some(endpoint);
        }
        if let Ok(path) = env::var("FILEKEEPER_DROPBOX_TOKEN_PATH") {
            config.dropbox.token_path = PathBuf::from(path);
        }
        if let Ok(path) = env::var("FILEKEEPER_DRIVE_CREDENTIALS_PATH") {
            config.drive.credentials_path = PathBuf::from(path);
        }
        if let Ok(path) = env::var("FILEKEEPER_DRIVE_TOKEN_PATH") {
            config.drive.token_path = PathBuf::from(path);
        }
        if let Ok(id) = env::var("FILEKEEPER_DRIVE_ROOT_FOLDER_ID") {
            config.drive.root_folder_id = id;
        }

        Ok(config)
    }

    /// Build a configuration for the given company, provider, and base
    /// directory, with default folder layout, routing table, and retention.
    pub fn new(company_name: &str, provider: ProviderKind, base_dir: PathBuf) -> Self {
        let dropzone_name = format!("{}DropZone", company_name);
        let critical_folders = default_critical_folders(&base_dir, &dropzone_name);

        let exclude_patterns = vec![
            "*.DS_Store".to_string(),
            "__MACOSX/*".to_string(),
            "*.tmp".to_string(),
            "*.log".to_string(),
            "00_Admin/Backups/*".to_string(),
            "00_Admin/Local_Backups/*".to_string(),
            format!("{}/*", dropzone_name),
        ];

        Config {
            company_name: company_name.to_string(),
            backup_prefix: format!("{}_Backup", company_name),
            provider,
            mirror_source: None,
            critical_folders,
            routing_rules: default_routing_rules(),
            max_working_backups: DEFAULT_MAX_WORKING_BACKUPS,
            max_archive_backups: DEFAULT_MAX_ARCHIVE_BACKUPS,
            min_backup_size_bytes: DEFAULT_MIN_BACKUP_SIZE_BYTES,
            exclude_patterns,
            local: LocalSettings {
                storage_path: base_dir.join("00_Admin").join("Local_Backups"),
            },
            s3: S3Settings {
                bucket: String::new(),
                region: "us-west-2".to_string(),
                endpoint: None,
            },
            dropbox: DropboxSettings {
                token_path: base_dir.join("00_Admin").join("dropbox_token.json"),
            },
            drive: DriveSettings {
                credentials_path: base_dir.join("00_Admin").join("credentials.json"),
                token_path: base_dir.join("00_Admin").join("token.json"),
                root_folder_id: "root".to_string(),
            },
            base_dir,
        }
    }

    /// Produce a new configuration for a different company and/or provider.
    ///
    /// Retention numbers and provider settings carry over; the folder layout
    /// and backup prefix are re-derived from the new company name.
    pub fn reconfigured(&self, company_name: &str, provider: ProviderKind) -> Self {
        let mut next = Config::new(company_name, provider, self.base_dir.clone());
        next.mirror_source = self.mirror_source.clone();
        next.max_working_backups = self.max_working_backups;
        next.max_archive_backups = self.max_archive_backups;
        next.min_backup_size_bytes = self.min_backup_size_bytes;
        next.local = self.local.clone();
        next.s3 = self.s3.clone();
        next.dropbox = self.dropbox.clone();
        next.drive = self.drive.clone();
        next
    }

    /// New configuration using a different provider, everything else unchanged.
    pub fn with_provider(&self, provider: ProviderKind) -> Self {
        let mut next = self.clone();
        next.provider = provider;
        next
    }

    /// Absolute path for a folder key.
    pub fn folder_path(&self, key: &str) -> Result<&Path> {
        self.critical_folders
            .get(key)
            .map(PathBuf::as_path)
            .with_context(|| format!("Unknown folder key: {}", key))
    }

    /// Destination folder for a file extension, or `None` when unmapped.
    /// Extensions are matched case-insensitively, dot included.
    pub fn routing_destination(&self, extension: &str) -> Option<&Path> {
        let key = self.routing_rules.get(&extension.to_lowercase())?;
        self.critical_folders.get(key).map(PathBuf::as_path)
    }

    pub fn dropzone_dir(&self) -> &Path {
        &self.critical_folders["dropzone"]
    }

    pub fn backups_dir(&self) -> &Path {
        &self.critical_folders["backups"]
    }

    /// Archive tier for rotated bundles, under the working backup folder.
    pub fn archive_backups_dir(&self) -> PathBuf {
        self.backups_dir().join("Archive")
    }

    /// Create every critical folder (and the backup archive tier) that does
    /// not exist yet. Idempotent; existing folders are left alone.
    pub fn ensure_critical_folders(&self) -> Result<()> {
        for (key, path) in &self.critical_folders {
            if !path.exists() {
                std::fs::create_dir_all(path)
                    .with_context(|| format!("Failed to create folder {} at {}", key, path.display()))?;
                tracing::info!(folder = %key, path = %path.display(), "Created missing folder");
            }
        }
        let archive = self.archive_backups_dir();
        std::fs::create_dir_all(&archive)
            .with_context(|| format!("Failed to create {}", archive.display()))?;
        Ok(())
    }
}

fn default_critical_folders(base: &Path, dropzone_name: &str) -> BTreeMap<String, PathBuf> {
    let mut folders = BTreeMap::new();
    folders.insert("admin".into(), base.join("00_Admin"));
    folders.insert("backups".into(), base.join("00_Admin").join("Backups"));
    folders.insert("dropzone".into(), base.join(dropzone_name));
    folders.insert("archive".into(), base.join("Z_Archive"));
    folders.insert("branding".into(), base.join("01_Branding"));
    folders.insert("projects".into(), base.join("02_Projects"));
    folders.insert("mapping".into(), base.join("03_Mapping"));
    folders.insert("training".into(), base.join("04_Training"));
    folders.insert("automation".into(), base.join("05_Automation"));
    folders.insert("scripts".into(), base.join("05_Automation").join("Scripts"));
    folders.insert("business".into(), base.join("06_Business"));
    folders
}

fn default_routing_rules() -> BTreeMap<String, String> {
    let rules: &[(&str, &str)] = &[
        // Administrative documents
        (".pdf", "admin"),
        (".docx", "admin"),
        (".doc", "admin"),
        (".xlsx", "admin"),
        (".xls", "admin"),
        (".csv", "admin"),
        (".txt", "admin"),
        (".rtf", "admin"),
        (".odt", "admin"),
        (".ods", "admin"),
        // Branding and marketing materials
        (".png", "branding"),
        (".jpg", "branding"),
        (".jpeg", "branding"),
        (".gif", "branding"),
        (".bmp", "branding"),
        (".tiff", "branding"),
        (".svg", "branding"),
        (".ai", "branding"),
        (".psd", "branding"),
        (".eps", "branding"),
        // Project and GIS data
        (".tif", "projects"),
        (".shp", "projects"),
        (".dbf", "projects"),
        (".prj", "projects"),
        (".shx", "projects"),
        (".cpg", "projects"),
        (".geojson", "projects"),
        (".kml", "projects"),
        (".kmz", "projects"),
        (".las", "projects"),
        (".laz", "projects"),
        (".dem", "projects"),
        (".asc", "projects"),
        (".img", "projects"),
        (".ecw", "projects"),
        (".sid", "projects"),
        // Mapping projects
        (".gpkg", "mapping"),
        (".qgz", "mapping"),
        (".qgs", "mapping"),
        (".qgd", "mapping"),
        (".sqlite", "mapping"),
        (".db", "mapping"),
        // Training materials
        (".mp4", "training"),
        (".avi", "training"),
        (".mov", "training"),
        (".wmv", "training"),
        (".flv", "training"),
        (".webm", "training"),
        (".mp3", "training"),
        (".wav", "training"),
        (".aac", "training"),
        (".flac", "training"),
        // Scripts and automation
        (".py", "scripts"),
        (".sh", "scripts"),
        (".command", "scripts"),
        (".bat", "scripts"),
        (".ps1", "scripts"),
        (".js", "scripts"),
        (".html", "scripts"),
        (".css", "scripts"),
        (".json", "scripts"),
        (".xml", "scripts"),
        (".yaml", "scripts"),
        (".yml", "scripts"),
        // Backups and archives
        (".zip", "backups"),
        (".tar", "backups"),
        (".gz", "backups"),
        (".7z", "backups"),
        (".rar", "backups"),
        (".iso", "backups"),
        // Business documents
        (".pptx", "business"),
        (".ppt", "business"),
        (".key", "business"),
        (".odp", "business"),
        (".md", "business"),
        (".markdown", "business"),
    ];

    rules
        .iter()
        .map(|(ext, key)| (ext.to_string(), key.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_config(base: &Path) -> Config {
        Config::new("TestCo", ProviderKind::Local, base.to_path_buf())
    }

    #[test]
    fn routing_is_case_insensitive_with_dot() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        let pdf = config.routing_destination(".PDF").unwrap();
        assert_eq!(pdf, config.folder_path("admin").unwrap());
        assert!(config.routing_destination(".xyz").is_none());
    }

    #[test]
    fn routing_rules_reference_known_folder_keys() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        for key in config.routing_rules.values() {
            assert!(
                config.critical_folders.contains_key(key),
                "routing rule references unknown folder key {}",
                key
            );
        }
    }

    #[test]
    fn ensure_critical_folders_is_idempotent() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        config.ensure_critical_folders().unwrap();
        config.ensure_critical_folders().unwrap();

        assert!(config.dropzone_dir().is_dir());
        assert!(config.backups_dir().is_dir());
        assert!(config.archive_backups_dir().is_dir());
        assert!(config.dropzone_dir().ends_with("TestCoDropZone"));
    }

    #[test]
    fn reconfigured_produces_new_value() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        let next = config.reconfigured("OtherCo", ProviderKind::Dropbox);
        assert_eq!(next.backup_prefix, "OtherCo_Backup");
        assert_eq!(next.provider, ProviderKind::Dropbox);
        assert!(next.dropzone_dir().ends_with("OtherCoDropZone"));

        // the original is untouched
        assert_eq!(config.company_name, "TestCo");
        assert_eq!(config.provider, ProviderKind::Local);
    }

    #[test]
    fn bundle_excludes_cover_dropzone_and_backups() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        assert!(config
            .exclude_patterns
            .iter()
            .any(|p| p.contains("TestCoDropZone")));
        assert!(config
            .exclude_patterns
            .iter()
            .any(|p| p.contains("Backups")));
    }
}
