use std::path::Path;

use filekeeper_core::{Config, ProviderKind};
use tokio::process::Command;

/// One health probe's result.
#[derive(Debug)]
pub struct HealthCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl HealthCheck {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        HealthCheck {
            name: name.to_string(),
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        HealthCheck {
            name: name.to_string(),
            passed: false,
            detail: detail.into(),
        }
    }
}

pub fn all_passed(checks: &[HealthCheck]) -> bool {
    checks.iter().all(|c| c.passed)
}

/// Run every health probe and collect the results. Probes never abort the
/// run; a broken environment should produce a full report, not a crash.
pub async fn run_health_checks(config: &Config) -> Vec<HealthCheck> {
    let mut checks = Vec::new();

    checks.push(base_dir_writable(&config.base_dir));
    checks.push(critical_folders_present(config));
    checks.push(routing_rules_consistent(config));
    checks.push(tool_available("zip", &["-v"]).await);
    checks.push(tool_available("rsync", &["--version"]).await);
    checks.push(provider_artifacts(config));

    checks
}

fn base_dir_writable(base: &Path) -> HealthCheck {
    if !base.is_dir() {
        return HealthCheck::fail("base directory", format!("{} does not exist", base.display()));
    }
    let probe = base.join(".filekeeper_health_probe");
    match std::fs::write(&probe, b"probe") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            HealthCheck::pass("base directory", format!("{} is writable", base.display()))
        }
        Err(e) => HealthCheck::fail(
            "base directory",
            format!("{} is not writable: {}", base.display(), e),
        ),
    }
}

fn critical_folders_present(config: &Config) -> HealthCheck {
    let missing: Vec<String> = config
        .critical_folders
        .iter()
        .filter(|(_, path)| !path.is_dir())
        .map(|(key, _)| key.clone())
        .collect();

    if missing.is_empty() {
        HealthCheck::pass(
            "critical folders",
            format!("all {} folders present", config.critical_folders.len()),
        )
    } else {
        HealthCheck::fail(
            "critical folders",
            format!("missing: {} (run any routing or backup command to create them)", missing.join(", ")),
        )
    }
}

fn routing_rules_consistent(config: &Config) -> HealthCheck {
    let dangling: Vec<&str> = config
        .routing_rules
        .values()
        .filter(|key| !config.critical_folders.contains_key(*key))
        .map(String::as_str)
        .collect();

    if dangling.is_empty() {
        HealthCheck::pass(
            "routing rules",
            format!("{} extensions mapped", config.routing_rules.len()),
        )
    } else {
        HealthCheck::fail(
            "routing rules",
            format!("rules reference unknown folder keys: {}", dangling.join(", ")),
        )
    }
}

async fn tool_available(tool: &str, args: &[&str]) -> HealthCheck {
    let name = format!("{} binary", tool);
    match Command::new(tool).args(args).output().await {
        Ok(_) => HealthCheck::pass(&name, "found on PATH"),
        Err(e) => HealthCheck::fail(&name, format!("not runnable: {}", e)),
    }
}

/// Credential artifacts the configured provider needs before it can connect.
fn provider_artifacts(config: &Config) -> HealthCheck {
    let name = "provider credentials";
    match config.provider {
        ProviderKind::Local => {
            if config.local.storage_path.as_os_str().is_empty() {
                HealthCheck::fail(name, "local storage path is not configured")
            } else {
                HealthCheck::pass(
                    name,
                    format!("local storage at {}", config.local.storage_path.display()),
                )
            }
        }
        ProviderKind::S3 => {
            if config.s3.bucket.is_empty() {
                HealthCheck::fail(name, "FILEKEEPER_S3_BUCKET is not set")
            } else {
                HealthCheck::pass(name, format!("bucket {} configured", config.s3.bucket))
            }
        }
        ProviderKind::Dropbox => {
            if config.dropbox.token_path.is_file() {
                HealthCheck::pass(
                    name,
                    format!("token file at {}", config.dropbox.token_path.display()),
                )
            } else {
                HealthCheck::fail(
                    name,
                    format!("token file missing: {}", config.dropbox.token_path.display()),
                )
            }
        }
        ProviderKind::GoogleDrive => {
            if !config.drive.credentials_path.is_file() {
                HealthCheck::fail(
                    name,
                    format!(
                        "credentials file missing: {}",
                        config.drive.credentials_path.display()
                    ),
                )
            } else if !config.drive.token_path.is_file() {
                HealthCheck::fail(
                    name,
                    format!("token file missing: {}", config.drive.token_path.display()),
                )
            } else {
                HealthCheck::pass(name, "credentials and token files present")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn healthy_local_setup_passes_filesystem_checks() {
        let dir = tempdir().unwrap();
        let config = Config::new("TestCo", ProviderKind::Local, dir.path().to_path_buf());
        config.ensure_critical_folders().unwrap();

        let checks = run_health_checks(&config).await;

        for check in &checks {
            if ["base directory", "critical folders", "routing rules", "provider credentials"]
                .contains(&check.name.as_str())
            {
                assert!(check.passed, "{}: {}", check.name, check.detail);
            }
        }
    }

    #[tokio::test]
    async fn missing_folders_and_bad_rules_are_reported() {
        let dir = tempdir().unwrap();
        let mut config = Config::new("TestCo", ProviderKind::Local, dir.path().to_path_buf());
        config
            .routing_rules
            .insert(".foo".to_string(), "no_such_key".to_string());

        let checks = run_health_checks(&config).await;

        let folders = checks.iter().find(|c| c.name == "critical folders").unwrap();
        assert!(!folders.passed);
        let rules = checks.iter().find(|c| c.name == "routing rules").unwrap();
        assert!(!rules.passed);
        assert!(rules.detail.contains("no_such_key"));
        assert!(!all_passed(&checks));
    }

    #[tokio::test]
    async fn dropbox_provider_requires_token_file() {
        let dir = tempdir().unwrap();
        let mut config = Config::new("TestCo", ProviderKind::Dropbox, dir.path().to_path_buf());
        config.dropbox.token_path = dir.path().join("missing_token.txt");

        let checks = run_health_checks(&config).await;
        let creds = checks
            .iter()
            .find(|c| c.name == "provider credentials")
            .unwrap();
        assert!(!creds.passed);

        std::fs::write(dir.path().join("token.txt"), "sl.token").unwrap();
        config.dropbox.token_path = dir.path().join("token.txt");
        let checks = run_health_checks(&config).await;
        let creds = checks
            .iter()
            .find(|c| c.name == "provider credentials")
            .unwrap();
        assert!(creds.passed);
    }
}
