//! Sentinel application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing (stderr, so the transcript on stdout stays clean)
//! 3. Open the local record store (SQLite key-value)
//! 4. Route: identity -> onboarding -> chat, or run a one-shot subcommand

mod cli;
mod render;
mod repl;

use std::io::Write;
use std::sync::Arc;

use clap::Parser;

use sentinel_chat::{ChatOrchestrator, Cooldown, GeminiClient, SessionState};
use sentinel_core::config::SentinelConfig;
use sentinel_core::types::View;
use sentinel_storage::{Database, ProfileStore, SqliteKvStore};

use crate::cli::{CliArgs, Command};
use crate::render::dossier_record;
use crate::repl::Repl;

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    // Config is read before tracing starts so its log level can apply.
    let config_file = args.resolve_config_path();
    let loaded = SentinelConfig::load(&config_file);
    let log_level =
        args.resolve_log_level(loaded.as_ref().ok().map(|c| c.general.log_level.as_str()));
    init_tracing(&log_level);

    tracing::info!("Starting Aura Sentinel v{}", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Err(e) if config_file.exists() => {
            tracing::warn!(path = %config_file.display(), error = %e, "Invalid config file, using defaults");
            SentinelConfig::default()
        }
        Err(_) => {
            tracing::info!(path = %config_file.display(), "No config file, using defaults");
            SentinelConfig::default()
        }
    };

    // Storage.
    let data_dir = args.resolve_data_dir(&config.general.data_dir);
    let db_path = data_dir.join("sentinel.db");
    let db = Database::new(&db_path).map_err(|e| {
        tracing::error!(path = %db_path.display(), error = %e, "Failed to open record store");
        e
    })?;
    tracing::info!(path = %db_path.display(), "Record store opened");
    let store = ProfileStore::new(Arc::new(SqliteKvStore::new(Arc::new(db))));

    match args.command() {
        Command::Login { id, code } => {
            store.authenticate(&id, &code)?;
            println!("Identity core initialized.");
            Ok(())
        }
        Command::Profile => {
            println!("{}", dossier_record(store.load_profile()?.as_ref()));
            Ok(())
        }
        Command::Purge { yes } => purge(&store, yes),
        Command::Onboard => run_chat(&config, &store, true).await,
        Command::Chat => run_chat(&config, &store, false).await,
    }
}

fn purge(store: &ProfileStore, confirmed: bool) -> AppResult<()> {
    if !confirmed {
        print!("Purge All Records? This clears identity and baseline. [y/N] ");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }
    store.purge()?;
    tracing::info!("All records purged");
    println!("All records purged.");
    Ok(())
}

/// Interactive session: identity, onboarding, then the chat loop.
async fn run_chat(config: &SentinelConfig, store: &ProfileStore, force_onboarding: bool) -> AppResult<()> {
    let mut repl = Repl::new();

    let mut view = store.initial_view()?;
    if view == View::Auth {
        if !repl.authenticate(store).await? {
            return Ok(());
        }
        view = store.initial_view()?;
    }

    if force_onboarding {
        view = View::Onboarding;
    }

    let backend = Arc::new(GeminiClient::from_config(&config.model)?);
    let profile = match view {
        View::Onboarding => None,
        _ => store.load_profile()?,
    };
    let state = Arc::new(SessionState::new(profile, view));
    let orchestrator = Arc::new(ChatOrchestrator::new(
        backend,
        state,
        Cooldown::new(),
        config,
    )?);

    if view == View::Onboarding {
        let Some(profile) = repl.onboard(store).await? else {
            return Ok(());
        };
        repl.sync_baseline(&orchestrator, profile).await?;
    }

    repl.run(&orchestrator).await?;
    tracing::info!("Session closed");
    Ok(())
}
