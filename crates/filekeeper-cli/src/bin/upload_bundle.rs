use anyhow::Result;
use clap::Parser;
use filekeeper_backup::{find_latest_bundle, BackupUploader, ChunkedUploader};
use filekeeper_core::ProviderKind;
use filekeeper_storage::create_provider;

#[derive(Parser, Debug)]
#[command(name = "upload_bundle")]
#[command(about = "Upload the newest backup bundle to remote storage")]
struct Args {
    /// Provider to upload with, overriding the configured one
    /// (local, s3, dropbox, google-drive)
    provider: Option<ProviderKind>,

    /// Use the resumable chunked uploader for large bundles
    #[arg(long)]
    chunked: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    filekeeper_cli::init_tracing();
    let args = Args::parse();

    let mut config = filekeeper_cli::load_config()?;
    if let Some(provider) = args.provider {
        config = config.with_provider(provider);
    }

    let provider = create_provider(&config).await?;

    if args.chunked {
        let bundle = find_latest_bundle(&config).await?;
        let outcome = ChunkedUploader::new(provider).upload(&bundle).await?;
        println!(
            "Uploaded {} ({} chunk(s), {} resumed) to {}",
            bundle.display(),
            outcome.uploaded,
            outcome.resumed,
            outcome.destination
        );
    } else {
        let outcome = BackupUploader::new(provider).upload_latest(&config).await?;
        println!(
            "Uploaded {} as {} in {} attempt(s)",
            outcome.bundle.display(),
            outcome.remote_id,
            outcome.attempts
        );
        if !outcome.prune.is_complete() {
            for error in outcome.prune.errors() {
                eprintln!("warning: {}", error);
            }
        }
    }

    Ok(())
}
