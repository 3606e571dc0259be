//! One reconciliation pass over every configured organization.
//!
//! Configuration comes from the environment (see [`AppConfig`]). The JSON
//! report goes to stdout, logs go to stderr. The exit code is non-zero when
//! any organization failed or the pass could not start.

use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use teamsync::cache::MemoryCache;
use teamsync::directory::GraphDirectory;
use teamsync::platforms::github::StaticTokenConnector;
use teamsync::sync::FleetSync;
use teamsync::{AppConfig, Error, FleetSyncResult, SyncContext};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run() -> Result<FleetSyncResult, Error> {
    let config = AppConfig::from_env()?;

    let graph_token = config
        .graph_token
        .clone()
        .ok_or_else(|| Error::invalid_argument("GRAPH_TOKEN is not set"))?;
    let directory = GraphDirectory::new(&config.graph_api_url, graph_token)?.with_retry_policy(config.retry);
    let connector = StaticTokenConnector::from_config(&config)?;

    let cache = Arc::new(MemoryCache::new());
    let ctx = SyncContext::new(config).with_cache(cache.clone());
    let report = FleetSync::new(ctx, Arc::new(directory), Arc::new(connector))
        .run()
        .await?;

    let stats = cache.stats().await;
    debug!(entries = stats.entries, expired = stats.expired, "Membership cache after pass");
    Ok(report)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    info!(version = teamsync::VERSION_STRING, "Starting teamsync");

    let report = match run().await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Sync could not run");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!(error = %e, "Failed to serialize report");
            return ExitCode::FAILURE;
        }
    }

    if report.failed_orgs().next().is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
