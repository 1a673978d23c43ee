//! Threadline CLI
//!
//! Operator commands for the Threadline discussion store.
//!
//! # Usage
//!
//! ```bash
//! # Create the durable schema
//! threadline --storage postgres --database-url postgres://localhost/threads migrate
//!
//! # Exercise a backend end to end
//! STORAGE_TYPE=memory threadline smoke
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use threadline_core::{
    CommentEvent, DiscussionService, NewComment, NewPost, OpContext, PostgresStorage, Storage,
    StorageConfig, StorageKind, Subscription, TopicNotifier,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Application name
pub const APP_NAME: &str = "threadline";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long `smoke` waits for its own comment event
const SMOKE_EVENT_WAIT_MS: u64 = 2_000;

/// Per-command deadline
const COMMAND_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// CLI
// =============================================================================

/// Threadline - posts, threaded comments, live updates
#[derive(Parser, Debug)]
#[command(name = APP_NAME)]
#[command(about = "Operator CLI for the Threadline discussion store")]
#[command(version)]
struct Cli {
    /// Backend to use (overrides STORAGE_TYPE)
    #[arg(long, global = true)]
    storage: Option<StorageKind>,

    /// Postgres URL (overrides DATABASE_URL and DB_*)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the durable schema (idempotent)
    Migrate,
    /// Create a post, a comment and a reply, then print them as JSON
    Smoke {
        /// Title of the smoke-test post
        #[arg(long, default_value = "Test")]
        title: String,
    },
}

impl Cli {
    fn storage_config(&self) -> anyhow::Result<StorageConfig> {
        let mut config = StorageConfig::from_env().context("invalid storage environment")?;
        if let Some(kind) = self.storage {
            config.kind = kind;
        }
        if let Some(url) = &self.database_url {
            config.database_url = Some(url.clone());
        }
        Ok(config)
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "info,sqlx=warn",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .init();

    tracing::info!("Threadline v{}", APP_VERSION);

    let config = cli.storage_config()?;
    tracing::info!(storage = %config.kind, "Storage selected");

    match cli.command {
        Commands::Migrate => migrate(&config).await,
        Commands::Smoke { title } => smoke(&config, &title).await,
    }
}

async fn migrate(config: &StorageConfig) -> anyhow::Result<()> {
    if config.kind != StorageKind::Postgres {
        anyhow::bail!("migrate needs --storage postgres (or STORAGE_TYPE=postgres)");
    }
    let url = config
        .database_url
        .as_deref()
        .context("no database URL configured")?;

    // Connecting creates the schema.
    let storage = PostgresStorage::connect(url, config.max_connections).await?;
    storage.close().await;

    tracing::info!("Schema ready");
    Ok(())
}

async fn smoke(config: &StorageConfig, title: &str) -> anyhow::Result<()> {
    let storage = config.connect().await?;
    let result = run_smoke(Arc::clone(&storage), title).await;
    storage.close().await;
    result
}

/// Wait for the event of the comment just added.
async fn next_event(events: &mut Subscription<String>) -> anyhow::Result<CommentEvent> {
    let raw = tokio::time::timeout(Duration::from_millis(SMOKE_EVENT_WAIT_MS), events.recv())
        .await
        .context("no comment event received")?
        .context("subscription ended early")?;
    Ok(serde_json::from_str(&raw)?)
}

async fn run_smoke(storage: Arc<dyn Storage>, title: &str) -> anyhow::Result<()> {
    let service = DiscussionService::new(storage, Arc::new(TopicNotifier::new()));
    let cx = OpContext::background().with_timeout(Duration::from_secs(COMMAND_TIMEOUT_SECS));
    let user = Uuid::new_v4();

    let post = service
        .create_post(&cx, NewPost::new(title, "Smoke test post", user))
        .await?;

    let listen = CancellationToken::new();
    let mut events = service.subscribe(&listen, post.id).await?;

    // One buffered event per subscription: drain after each comment.
    let root = service
        .add_comment(&cx, NewComment::root(post.id, "First!", user))
        .await?;
    let root_event = next_event(&mut events).await?;

    let reply = service
        .add_comment(&cx, NewComment::reply(post.id, root.id, "Reply to first", user))
        .await?;
    let reply_event = next_event(&mut events).await?;
    listen.cancel();

    anyhow::ensure!(
        root_event.comment.id == root.id && reply_event.comment.id == reply.id,
        "events arrived out of order"
    );

    let fetched = service.storage().get_comment(&cx, reply.id).await?;
    anyhow::ensure!(
        fetched.parent_id == Some(root.id),
        "reply {} lost its parent",
        reply.id
    );

    let roots = service.comments(&cx, post.id, 1, 10).await?;
    anyhow::ensure!(
        roots.iter().any(|c| c.id == root.id),
        "root comment {} missing from listing",
        root.id
    );

    let report = serde_json::json!({
        "post": post,
        "root_comments": roots,
        "replies": service.replies(&cx, root.id).await?,
        "events": [root_event, reply_event],
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
