//! `kiwiscript` maintenance binary.

use clap::Parser as _;
use kiwiscript_app::cli::Cli;
use kiwiscript_app::config::Config;
use kiwiscript_app::telemetry;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let config = Config::from_env();
    telemetry::init_tracing(&config)?;
    kiwiscript_runtime::metrics::register_metrics();

    let cli = Cli::parse();
    tracing::debug!(?cli, "Parsed command line");

    kiwiscript_app::run(&config, cli.command).await
}
