use anyhow::Result;
use clap::Parser;
use concourse_blockers::cli::Cli;
use concourse_blockers::output;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting concourse-blockers");
    cli.execute().await?;

    Ok(())
}
