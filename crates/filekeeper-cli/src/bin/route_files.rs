use anyhow::{bail, Result};
use clap::Parser;
use filekeeper_router::FileRouter;

#[derive(Parser, Debug)]
#[command(name = "route_files")]
#[command(about = "Route files from the drop zone to their destination folders")]
struct Args {}

#[tokio::main]
async fn main() -> Result<()> {
    filekeeper_cli::init_tracing();
    let _args = Args::parse();

    let config = filekeeper_cli::load_config()?;
    config.ensure_critical_folders()?;

    let report = FileRouter::new(config).route_all().await?;

    println!(
        "Routed {} file(s), removed {} duplicate(s), skipped {}",
        report.routed, report.duplicates, report.skipped
    );
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    for error in &report.errors {
        eprintln!("error: {}", error);
    }

    if !report.is_clean() {
        bail!("{} file(s) could not be routed", report.failed_files.len());
    }
    Ok(())
}
