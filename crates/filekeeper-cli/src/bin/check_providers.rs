use anyhow::{bail, Result};
use clap::Parser;
use filekeeper_core::ProviderKind;
use filekeeper_storage::create_provider;

#[derive(Parser, Debug)]
#[command(name = "check_providers")]
#[command(about = "Connect to a storage provider and verify credentials")]
struct Args {
    /// Provider to check, overriding the configured one
    /// (local, s3, dropbox, google-drive)
    provider: Option<ProviderKind>,
}

#[tokio::main]
async fn main() -> Result<()> {
    filekeeper_cli::init_tracing();
    let args = Args::parse();

    let mut config = filekeeper_cli::load_config()?;
    if let Some(provider) = args.provider {
        config = config.with_provider(provider);
    }

    let provider = match create_provider(&config).await {
        Ok(provider) => provider,
        Err(e) => bail!("{}: setup failed: {}", config.provider, e),
    };

    if provider.test_connection().await {
        println!("{}: OK", provider.kind());
        Ok(())
    } else {
        bail!("{}: connection test failed", provider.kind());
    }
}
