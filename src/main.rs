// This is the entry point of the chat moderation engine.
//
// **Architecture Overview:**
// - `core/` = Business logic (host-agnostic)
// - `infra/` = Implementations of core traits (SQLite, JSON file, in-memory)
// - `console/` = Console host adapter (commands, verdict rendering)
//
// This file's job is to:
// 1. Load configuration
// 2. Pick and open the mute store
// 3. Wire the pipeline together and start background maintenance
// 4. Run the console session, then save state on the way out

#[path = "console/console_layer.rs"]
mod console;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::console::{run_session, ConsoleHost};
use crate::core::moderation::{
    spawn_maintenance, ModerationConfig, ModerationPipeline, MuteLedger, MuteStore,
    StorageBackend,
};
use crate::infra::moderation::{InMemoryMuteStore, JsonMuteStore, SqliteMuteStore};
use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "data/chat_guard.json";

/// Open the configured backend. SQLite falls back to the JSON file store
/// when it can't be opened.
async fn open_store(config: &ModerationConfig) -> Arc<dyn MuteStore> {
    let storage = &config.storage;
    match storage.backend {
        StorageBackend::Sqlite => match SqliteMuteStore::new(&storage.sqlite_path).await {
            Ok(store) => {
                match store.cleanup_expired(chrono::Utc::now()).await {
                    Ok(removed) if removed > 0 => {
                        tracing::info!("Removed {} expired mutes from the database", removed)
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Failed to clean up expired mutes: {}", e),
                }
                tracing::info!(path = %storage.sqlite_path, "Using SQLite mute store");
                Arc::new(store)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to open SQLite store at {}, falling back to {}: {}",
                    storage.sqlite_path,
                    storage.json_path,
                    e
                );
                Arc::new(JsonMuteStore::new(&storage.json_path))
            }
        },
        StorageBackend::Json => {
            tracing::info!(path = %storage.json_path, "Using JSON mute store");
            Arc::new(JsonMuteStore::new(&storage.json_path))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory mute store; mutes will not survive a restart");
            Arc::new(InMemoryMuteStore::new())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening (RUST_LOG overrides)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config_path =
        std::env::var("CHAT_GUARD_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = ModerationConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let store = open_store(&config).await;
    let mutes = Arc::new(MuteLedger::load(store).await);
    let pipeline = Arc::new(ModerationPipeline::new(config, Arc::clone(&mutes)));
    let maintenance = spawn_maintenance(Arc::clone(&pipeline));

    let host = ConsoleHost::new(Arc::clone(&pipeline), &config_path);
    tracing::info!(
        "{} {} ready; type `help` for commands",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let result = run_session(&host, stdin, tokio::io::stdout()).await;

    // Shutdown: stop the sweeper, drain queued writes, then save everything
    maintenance.abort();
    mutes.flush().await;
    mutes.persist_all().await;
    tracing::info!("Saved {} mutes", mutes.len());

    result
}
