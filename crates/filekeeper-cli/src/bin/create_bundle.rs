use anyhow::Result;
use clap::Parser;
use filekeeper_backup::create_bundle;

#[derive(Parser, Debug)]
#[command(name = "create_bundle")]
#[command(about = "Create a timestamped backup bundle of the base directory")]
struct Args {}

#[tokio::main]
async fn main() -> Result<()> {
    filekeeper_cli::init_tracing();
    let _args = Args::parse();

    let config = filekeeper_cli::load_config()?;
    config.ensure_critical_folders()?;

    let bundle = create_bundle(&config).await?;
    println!("{}", bundle.display());
    Ok(())
}
