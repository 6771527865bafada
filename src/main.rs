//! Jaidee conversation engine CLI.
//!
//! Usage:
//!   jaidee chat --user alice
//!   jaidee --config ./jaidee.toml check

use clap::{Parser, Subcommand};
use jaidee_agent::ConversationEngine;
use jaidee_core::JaideeConfig;
use jaidee_memory::{MemoryKv, SqliteConversationStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(
    name = "jaidee",
    version,
    about = "Jaidee: session and follow-up engine for a counselling chatbot"
)]
struct Cli {
    /// Config file (defaults to ~/.jaidee/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat on stdin as one user, one message per line. Follow-ups are
    /// polled in the background while the chat runs.
    Chat {
        #[arg(short, long, default_value = "local")]
        user: String,
    },
    /// Validate the config and print the effective settings
    Check,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

fn load_config(path: Option<&str>) -> anyhow::Result<JaideeConfig> {
    let config = match path {
        Some(p) => JaideeConfig::load_from(&PathBuf::from(expand_path(p)))?,
        None => JaideeConfig::load()?,
    };
    config.validate()?;
    Ok(config)
}

fn build_engine(config: &JaideeConfig, kv: Arc<MemoryKv>) -> anyhow::Result<ConversationEngine> {
    let db_path = expand_path(&config.storage.db_path);
    let store = SqliteConversationStore::open(std::path::Path::new(&db_path))?;
    let completion = jaidee_providers::create_completion(&config.llm)?;
    let push = jaidee_scheduler::push_from_config(&config.push)?;

    tracing::info!("🗄️ Conversations: {db_path}");
    tracing::info!("🤖 Completion provider: {}", completion.name());

    let engine = ConversationEngine::new(
        config,
        kv,
        Arc::new(store),
        completion,
        push,
    )?;
    Ok(engine)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Check => {
            println!("✅ Config OK");
            println!("   Session TTL:      {}s", config.session.ttl_secs);
            println!("   Idle timeout:     {}s", config.session.timeout_secs);
            println!("   History budget:   {} tokens", config.history.budget_tokens);
            println!("   Follow-up offsets: {:?} days", config.follow_up.offsets_days);
            println!("   Poll interval:    {}s", config.follow_up.poll_interval_secs);
            println!("   LLM:              {} @ {}", config.llm.model, config.llm.endpoint);
            println!("   Database:         {}", expand_path(&config.storage.db_path));
        }
        Commands::Chat { user } => {
            let kv = Arc::new(MemoryKv::new());
            let engine = Arc::new(build_engine(&config, kv.clone())?);

            // expiry in MemoryKv is lazy; sweep on every poll tick
            let poller = engine.clone();
            let follow_ups = jaidee_scheduler::spawn_follow_up_loop(
                move |now| {
                    if let Err(e) = kv.purge_expired() {
                        tracing::warn!("⚠️ Key sweep failed: {e}");
                    }
                    let engine = poller.clone();
                    async move { engine.run_scheduled_follow_up_poll(now).await }
                },
                config.follow_up.poll_interval_secs,
            );

            println!(
                "💬 Jaidee v{}, chatting as '{user}' (Ctrl-D to quit)\n",
                env!("CARGO_PKG_VERSION")
            );
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                let reply = engine.handle_inbound_message(&user, text, chrono::Utc::now()).await;
                match reply.reply_text {
                    Some(text) => println!("🤖 {text}\n"),
                    None if reply.locked => println!("⏳ (busy)\n"),
                    None => println!("🤖 (no reply)\n"),
                }
            }

            follow_ups.abort();
            tracing::info!("👋 Chat closed");
        }
    }

    Ok(())
}
