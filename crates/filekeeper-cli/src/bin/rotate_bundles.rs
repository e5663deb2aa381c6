use anyhow::{bail, Result};
use clap::Parser;
use filekeeper_backup::rotate_bundles;
use filekeeper_core::BestEffort;

#[derive(Parser, Debug)]
#[command(name = "rotate_bundles")]
#[command(about = "Rotate working backups into the archive tier and prune old archives")]
struct Args {}

#[tokio::main]
async fn main() -> Result<()> {
    filekeeper_cli::init_tracing();
    let _args = Args::parse();

    let config = filekeeper_cli::load_config()?;
    let summary = rotate_bundles(&config).await?;

    println!(
        "Archived {} bundle(s), pruned {}, skipped {}",
        summary.archived, summary.pruned, summary.skipped
    );

    match summary.outcome {
        BestEffort::Complete => Ok(()),
        BestEffort::Partial { errors } => {
            for error in &errors {
                eprintln!("warning: {}", error);
            }
            Ok(())
        }
        BestEffort::Failed { error } => bail!("rotation failed: {}", error),
    }
}
