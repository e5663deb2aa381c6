use anyhow::Result;
use clap::Parser;
use filekeeper_backup::mirror_tree;

#[derive(Parser, Debug)]
#[command(name = "mirror_tree")]
#[command(about = "Mirror the configured source tree into the base directory")]
struct Args {}

#[tokio::main]
async fn main() -> Result<()> {
    filekeeper_cli::init_tracing();
    let _args = Args::parse();

    let config = filekeeper_cli::load_config()?;
    mirror_tree(&config).await?;

    println!("Mirror sync complete: {}", config.base_dir.display());
    Ok(())
}
