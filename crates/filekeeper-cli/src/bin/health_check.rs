use anyhow::{bail, Result};
use clap::Parser;
use filekeeper_cli::health::{all_passed, run_health_checks};

#[derive(Parser, Debug)]
#[command(name = "health_check")]
#[command(about = "Check the environment: folders, tools, and provider credentials")]
struct Args {}

#[tokio::main]
async fn main() -> Result<()> {
    filekeeper_cli::init_tracing();
    let _args = Args::parse();

    let config = filekeeper_cli::load_config()?;
    let checks = run_health_checks(&config).await;

    for check in &checks {
        let status = if check.passed { "PASS" } else { "FAIL" };
        println!("[{}] {:<22} {}", status, check.name, check.detail);
    }

    if !all_passed(&checks) {
        bail!("one or more health checks failed");
    }
    println!("All checks passed");
    Ok(())
}
