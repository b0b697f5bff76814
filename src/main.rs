// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! workout-sync command line
//!
//! Syncs Strava activities and the lifting sheet into the local canonical
//! store, then summarizes and exports it.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use workout_sync::{
    config::Config,
    db::CanonicalStore,
    models::CanonicalWorkout,
    services::{
        export, CallbackListener, Clock, RemoteFetcher, RetryPolicy, SheetReader, StravaClient,
        SyncPipeline, SystemClock, TokenManager, WorkoutSummary,
    },
};

/// Redirect URI registered for the personal Strava app.
const DEFAULT_REDIRECT_URI: &str = "http://localhost:8000/exchange_token";

#[derive(Debug, Parser)]
#[command(name = "workout-sync", version, about = "Sync and reconcile workout data")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Authorize with Strava (captures the redirect locally, or exchanges --code)
    Auth {
        /// Authorization code copied from the redirect URL
        #[arg(long)]
        code: Option<String>,
        #[arg(long, default_value = DEFAULT_REDIRECT_URI)]
        redirect_uri: String,
    },
    /// Sync Strava and the lifting sheet into the store
    Fetch {
        /// Re-fetch the whole remote history, not just the delta
        #[arg(long)]
        full: bool,
    },
    /// Print per-category totals
    Analyze,
    /// Write workouts.json and summary.json
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write routes.geojson
    Visualize {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// fetch, analyze, export and visualize
    All {
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        full: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::debug!(config = ?config, "Loaded configuration");

    let store = CanonicalStore::open(&config.db_path)
        .await
        .context("Failed to open canonical store")?;

    match cli.command {
        Command::Auth { code, redirect_uri } => auth(&config, store, code, &redirect_uri).await,
        Command::Fetch { full } => Ok(exit_code(fetch(&config, store, full).await?)),
        Command::Analyze => {
            analyze(&store).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Export { output } => {
            let dir = output.unwrap_or_else(|| config.output_dir.clone());
            let records = store.all_records().await?;
            export::export_json(&records, &dir).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Visualize { output } => {
            let dir = output.unwrap_or_else(|| config.output_dir.clone());
            let records = store.all_records().await?;
            export::export_routes(&records, &dir).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::All { output, full } => {
            if !fetch(&config, store.clone(), full).await? {
                return Ok(ExitCode::FAILURE);
            }
            let dir = output.unwrap_or_else(|| config.output_dir.clone());
            let records = analyze(&store).await?;
            export::export_json(&records, &dir).await?;
            export::export_routes(&records, &dir).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Build the token manager over the Strava client and the store's vault.
async fn token_manager(
    config: &Config,
    client: Arc<StravaClient>,
    store: CanonicalStore,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Arc<TokenManager>> {
    let tokens = TokenManager::load(
        client,
        Arc::new(store),
        clock,
        config.token_refresh_margin,
        RetryPolicy::default(),
        config.strava_refresh_token.clone(),
    )
    .await?;
    Ok(Arc::new(tokens))
}

async fn auth(
    config: &Config,
    store: CanonicalStore,
    code: Option<String>,
    redirect_uri: &str,
) -> anyhow::Result<ExitCode> {
    let client = Arc::new(StravaClient::new(config)?);

    let code = match code {
        Some(code) => code,
        None => {
            let listener = CallbackListener::bind(redirect_uri).await?;
            println!("Open this URL and approve access:");
            println!("{}", client.authorize_url(redirect_uri));
            println!("Waiting for the redirect on {}...", listener.local_addr()?);
            listener.wait_for_code().await?
        }
    };

    let tokens = token_manager(config, client, store, Arc::new(SystemClock)).await?;
    let token = tokens.exchange_authorization_code(&code).await?;
    println!("Authorized; access token valid until {}", token.expires_at);
    Ok(ExitCode::SUCCESS)
}

/// Run the sync pipeline; `false` if any source stopped early.
async fn fetch(config: &Config, store: CanonicalStore, full: bool) -> anyhow::Result<bool> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let client = Arc::new(StravaClient::new(config)?);
    let tokens = token_manager(config, client.clone(), store.clone(), clock.clone()).await?;

    let fetcher = RemoteFetcher::new(client, tokens, clock, RetryPolicy::default())
        .with_page_size(config.page_size)
        .with_max_rate_limit_wait(config.rate_limit_max_wait);
    let pipeline = SyncPipeline::new(fetcher, SheetReader::new(&config.sheet_path), store)
        .with_full_resync(full);

    // Dropping the run between batches leaves the last committed state.
    let report = tokio::select! {
        report = pipeline.run() => report,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; store left at last committed batch");
            return Ok(false);
        }
    };

    println!("{}", report.remote);
    println!("{}", report.sheet);

    Ok(report.is_success())
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn analyze(store: &CanonicalStore) -> anyhow::Result<Vec<CanonicalWorkout>> {
    let records = store.all_records().await?;
    print!("{}", WorkoutSummary::from_records(&records));
    Ok(records)
}

/// Initialize structured JSON logging on stderr.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true)
        .with_writer(std::io::stderr);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("workout_sync=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
