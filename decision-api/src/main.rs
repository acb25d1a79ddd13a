//! decision-api binary entry point.
//!
//! Usage:
//! ```bash
//! decision-api --config decision-api.toml serve
//! decision-api add-bouncer firewall-1
//! decision-api add-decision --value 192.0.2.1 --duration 4h
//! ```

use anyhow::{Context, Result};
use bouncer_sync_api::auth::generate_api_key;
use bouncer_sync_api::broadcast::{spawn_relay_consumer, DeletionRelay};
use bouncer_sync_api::cleanup::{spawn_cleanup_task, PurgePolicy};
use bouncer_sync_api::config::Config;
use bouncer_sync_api::http::{build_router, health};
use bouncer_sync_api::server::DecisionApi;
use bouncer_sync_api::storage::{DecisionStore, NewDecision, SqliteStore};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Decision synchronization server for polling bouncers.
#[derive(Parser, Debug)]
#[command(name = "decision-api")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "decision-api.toml")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve,

    /// Register a bouncer and print its API key
    AddBouncer {
        /// Bouncer name
        name: String,
    },

    /// Insert a decision
    AddDecision {
        /// Target value (address, range, ...)
        #[arg(long)]
        value: String,

        /// Scope of the value
        #[arg(long, default_value = "Ip")]
        scope: String,

        /// Remediation type
        #[arg(long = "type", default_value = "ban")]
        kind: String,

        /// Duration such as 4h or 30m
        #[arg(long, default_value = "4h")]
        duration: String,

        /// Issuing subsystem
        #[arg(long, default_value = "cscli")]
        origin: String,

        /// Scenario or reason
        #[arg(long, default_value = "manual ban")]
        scenario: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&cli.config)?;
    let store = SqliteStore::new(&config.storage.database)
        .await
        .with_context(|| format!("failed to open {}", config.storage.database.display()))?
        .with_expired_retention(config.storage.expired_retention()?);

    match cli.command {
        Commands::Serve => serve(config, store).await?,
        Commands::AddBouncer { name } => {
            let api_key = generate_api_key();
            let bouncer = store
                .create_bouncer(&name, &api_key)
                .await
                .context("failed to register bouncer")?;
            println!("Bouncer '{}' registered (id {}).", bouncer.name, bouncer.id);
            println!("API key: {api_key}");
            println!("This key is not stored and cannot be shown again.");
        }
        Commands::AddDecision {
            value,
            scope,
            kind,
            duration,
            origin,
            scenario,
        } => {
            let duration = decision_types::parse_duration(&duration)?;
            let decision = store
                .insert_decision(NewDecision {
                    value,
                    scope,
                    kind,
                    origin,
                    scenario,
                    duration,
                    created_at: Utc::now(),
                })
                .await
                .context("failed to insert decision")?;
            println!(
                "Decision {} added: {} {} {} until {}",
                decision.id, decision.kind, decision.scope, decision.value, decision.until
            );
        }
    }

    Ok(())
}

fn load_config(path: &std::path::Path) -> Result<Config> {
    if !path.exists() {
        tracing::warn!("{} not found, using default configuration", path.display());
        return Ok(Config::default());
    }
    Ok(Config::from_file(path)?)
}

async fn serve(config: Config, store: SqliteStore) -> Result<()> {
    health::init_start_time();

    let (relay, receiver) = DeletionRelay::from_config(&config.relay);
    if let Some(receiver) = receiver {
        spawn_relay_consumer(receiver);
    }

    let bind_address = config.http.bind_address.clone();
    let policy = PurgePolicy {
        retention: config.storage.expired_retention()?,
        expired_grace: config.sync.expired_grace()?,
    };
    let cleanup = config.cleanup.clone();

    let shared = Arc::new(store);
    let api = Arc::new(DecisionApi::new(config, shared.clone(), shared, relay)?);

    spawn_cleanup_task(
        api.store_arc(),
        api.rate_limits().clone(),
        policy,
        cleanup,
    );

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    tracing::info!("decision-api v{} listening on {}", env!("CARGO_PKG_VERSION"), bind_address);

    axum::serve(listener, build_router(api))
        .await
        .context("HTTP server error")?;

    Ok(())
}
