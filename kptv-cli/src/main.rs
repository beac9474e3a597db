//! `kptv-sync`: reconcile IPTV provider feeds with the stream catalog.

mod cli;
mod output;

use anyhow::{Context, Result};
use bridge_traits::LogLevel;
use clap::Parser;
use cli::{Action, Cli};
use core_runtime::config::CoreConfig;
use core_runtime::logging::init_logging;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    for note in cli.notes() {
        println!("Note: {}", note);
    }

    let mut config =
        CoreConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.debug {
        config.logging.level = LogLevel::Debug;
    }
    init_logging(config.logging.to_logging_config()).context("Failed to initialize logging")?;

    let core = core_service::bootstrap(config)
        .await
        .context("Failed to start core service")?;

    let token = core.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing units in flight");
            token.cancel();
        }
    });

    let filter = cli.filter();
    info!(action = ?cli.action, scope = %filter, "Starting");

    match cli.action {
        Action::Sync => {
            let report = core.sync(filter).await?;
            if report.units == 0 {
                println!("No providers found");
            } else {
                print!("{}", output::sync_summary(&report));
            }
        }
        Action::TestMissing => {
            if cli.check_all {
                println!("Checking all streams (including inactive)");
            }
            let report = core.test_missing(filter, cli.check_all).await?;
            if report.providers.is_empty() && report.failures.is_empty() && report.skipped == 0 {
                println!("No providers found");
            } else {
                print!("{}", output::missing_summary(&report, cli.debug));
            }
        }
        Action::Fixup => {
            let ignore = cli.ignore_fields();
            if !ignore.is_empty() {
                println!("Ignoring fields: {}", ignore);
            }
            let report = core.fixup(filter, &ignore).await?;
            if report.units == 0 {
                println!("No providers found");
            } else {
                print!("{}", output::fixup_summary(&report));
            }
        }
        Action::Cleanup => {
            print!("{}", output::cleanup_banner());
            let summary = core.cleanup().await;
            print!("{}", output::cleanup_summary(&summary));
        }
    }

    core.shutdown().await;
    Ok(())
}
