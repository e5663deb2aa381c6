//! Shared plumbing for the Filekeeper command-line binaries.

pub mod health;

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Load environment overrides from a `.env` file when one is present and
/// build the configuration.
pub fn load_config() -> anyhow::Result<filekeeper_core::Config> {
    dotenvy::dotenv().ok();
    filekeeper_core::Config::from_env()
}
