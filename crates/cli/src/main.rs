use std::path::PathBuf;
use std::sync::Arc;

use ailvi_core::constants::DEFAULT_BASE_URL;
use ailvi_core::{EngineConfig, env_non_empty, env_parse_with_default, env_required};
use ailvi_llm::LlmClient;
use ailvi_service::DialogueEngine;
use ailvi_storage::StorageBackend;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

const DEFAULT_PORT: u16 = 10000;

#[derive(Parser)]
#[command(name = "ailvi")]
#[command(about = "AILVI: a gentle self-discovery guide for Telegram", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot (polling or webhook, per MODE) with the health server.
    Run,
    /// Serve only the health endpoint.
    HealthServer {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Build a summary for a user whose summary was offered, or list stored ones.
    Summarize {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        list: bool,
    },
    /// Print a user's most recent audit-log entries as JSON.
    Logs {
        #[arg(short, long)]
        user: String,
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
}

fn get_db_path() -> PathBuf {
    env_non_empty("AILVI_DB_PATH").map_or_else(
        || {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ailvi")
                .join("ailvi.db")
        },
        PathBuf::from,
    )
}

fn ensure_db_dir(db_path: &std::path::Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn port() -> u16 {
    env_parse_with_default("PORT", DEFAULT_PORT)
}

async fn open_storage() -> Result<StorageBackend> {
    let kind = env_non_empty("AILVI_STORAGE").unwrap_or_else(|| "sqlite".to_owned());
    let storage = match kind.to_lowercase().as_str() {
        "memory" => StorageBackend::new_memory(),
        "sqlite" => {
            let db_path = get_db_path();
            ensure_db_dir(&db_path)?;
            StorageBackend::new_sqlite(&db_path)?
        },
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = env_required("DATABASE_URL")?;
            StorageBackend::new_postgres(&url).await?
        },
        #[cfg(not(feature = "postgres"))]
        "postgres" => anyhow::bail!("AILVI_STORAGE=postgres requires the `postgres` feature"),
        other => anyhow::bail!("unknown AILVI_STORAGE value: {other}"),
    };
    tracing::info!(backend = storage.kind(), "storage opened");
    Ok(storage)
}

async fn build_engine() -> Result<DialogueEngine> {
    let config = EngineConfig::from_env()?;
    let api_key = env_required("OPENAI_API_KEY")?;
    let base_url = env_non_empty("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
    let llm = LlmClient::new(api_key, base_url)?.with_model(config.model.clone());
    let storage = open_storage().await?;
    Ok(DialogueEngine::new(config, Arc::new(storage), Arc::new(llm)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run => commands::run::run().await,
        Commands::HealthServer { port: explicit } => {
            commands::health::run(explicit.unwrap_or_else(port)).await
        },
        Commands::Summarize { user, list } => commands::summarize::run(&user, list).await,
        Commands::Logs { user, limit } => commands::logs::run(&user, limit).await,
    }
}
