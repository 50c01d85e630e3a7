//! bankfind - Search bank codes from the command line
//!
//! Answers searches from a local JSON store, falling back to the partner bank
//! directory on a miss and writing the refreshed records back in the background.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bankfind::cache::{BankStore, JsonFileStore};
use bankfind::cli::{Cli, Command};
use bankfind::config::Config;
use bankfind::data::{PartnerClient, UpstreamGateway};
use bankfind::persist::{self, PersistConfig};
use bankfind::BankLookup;

/// Sets up logging to stderr so stdout only carries JSON
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "bankfind=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    init_tracing();

    let cli = Cli::parse();
    let config = cli.apply(Config::from_env()?)?;

    let store: Arc<dyn BankStore> = Arc::new(JsonFileStore::with_path(config.store_path.clone()));
    let upstream: Arc<dyn UpstreamGateway> = Arc::new(PartnerClient::new(&config)?);
    let (queue, worker) = persist::spawn(
        store.clone(),
        PersistConfig {
            queue_capacity: config.persist_queue,
            write_timeout: config.request_timeout,
        },
    );
    let lookup = BankLookup::new(store, upstream, queue, config.request_timeout);

    let exit = match cli.command {
        Command::Search { ref query, bare } => {
            let response = lookup.respond(query).await;
            let json = if bare {
                serde_json::to_string_pretty(&response.data)?
            } else {
                serde_json::to_string_pretty(&response)?
            };
            println!("{}", json);
            if response.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Command::Refresh => match lookup.refresh().await {
            Ok(count) => {
                println!("Stored {} banks", count);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "refresh failed");
                eprintln!("Refresh failed: {}", e);
                ExitCode::FAILURE
            }
        },
        Command::Clear => match lookup.clear().await {
            Ok(removed) => {
                println!("Removed {} banks", removed);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "clear failed");
                eprintln!("Clear failed: {}", e);
                ExitCode::FAILURE
            }
        },
    };

    // Let queued writes land before the process exits
    drop(lookup);
    worker.finish().await;

    Ok(exit)
}
