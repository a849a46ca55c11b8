//! # BobBot
//!
//! Personality-driven chat agent. Content generators enqueue work into a
//! persistent task queue; one worker per channel drains it.
//!
//! Usage:
//!   bobbot run                              # Start the agent
//!   bobbot run --dry-run                    # Log deliveries instead of sending
//!   bobbot tasks --status pending           # Inspect the queue
//!   bobbot enqueue --kind discord --channel 123 --content "hiss"
//!   bobbot set-status task-abc completed    # Manual status update

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bobbot_agent::{ChatResponder, IngestJob, JournalComposer, TweetComposer};
use bobbot_channels::{DiscordChannel, LogChannel, XChannel};
use bobbot_core::BobConfig;
use bobbot_core::traits::{Channel, ContextStore, Generator};
use bobbot_scheduler::{
    ChannelWorker, DeliveryHandler, DispatchScheduler, GenerationHandler, NewTask, SqliteStore,
    TaskFilter, TaskId, TaskKind, TaskStatus, TaskStore,
};

#[derive(Parser)]
#[command(
    name = "bobbot",
    version,
    about = "🐍 BobBot: personality-driven chat agent with a persistent task queue"
)]
struct Cli {
    /// Config file (default ~/.bobbot/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// SQLite database path (overrides config)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler, workers and content generators until SIGINT/SIGTERM
    Run {
        /// Log outbound messages instead of delivering them
        #[arg(long)]
        dry_run: bool,
    },
    /// List tasks, newest first
    Tasks {
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a task to the queue
    Enqueue {
        #[arg(long)]
        kind: String,
        #[arg(long)]
        content: String,
        /// Target channel id (required for discord)
        #[arg(long)]
        channel: Option<String>,
    },
    /// Set a task's status
    SetStatus { id: String, status: String },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = [
        "bobbot",
        "bobbot_core",
        "bobbot_scheduler",
        "bobbot_agent",
        "bobbot_channels",
        "bobbot_providers",
    ]
    .iter()
    .map(|target| format!("{target}={level}"))
    .collect::<Vec<_>>()
    .join(",");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<BobConfig> {
    let mut config = match &cli.config {
        Some(path) => BobConfig::load_from(Path::new(&shellexpand::tilde(path).to_string()))?,
        None => BobConfig::load()?,
    };
    config.apply_env_overrides();
    if let Some(db) = &cli.db {
        config.store.path = db.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    let db_path = config.db_path();
    let store = Arc::new(SqliteStore::open(&db_path)?);
    tracing::debug!("🗄️ Task store at {}", db_path.display());

    match cli.command {
        Commands::Run { dry_run } => run(config, store, dry_run).await,
        Commands::Tasks {
            kind,
            status,
            limit,
            json,
        } => list_tasks(store.as_ref(), kind, status, limit, json).await,
        Commands::Enqueue {
            kind,
            content,
            channel,
        } => {
            let mut task = NewTask::new(TaskKind::from(kind.as_str()), content);
            if let Some(channel) = channel {
                task = task.with_channel(channel);
            }
            let id = store.add_task(task).await?;
            println!("✅ Enqueued {id}");
            Ok(())
        }
        Commands::SetStatus { id, status } => {
            let status: TaskStatus = status.parse()?;
            store.update_task_status(&TaskId::from(id.as_str()), status).await?;
            println!("✅ {id} → {status}");
            Ok(())
        }
    }
}

async fn list_tasks(
    store: &SqliteStore,
    kind: Option<String>,
    status: Option<String>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let filter = TaskFilter {
        kind: kind.as_deref().map(TaskKind::from),
        status: status.as_deref().map(str::parse::<TaskStatus>).transpose()?,
        limit: Some(limit),
    };
    let tasks = store.list_tasks(&filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    for task in &tasks {
        let preview: String = task.content.chars().take(60).collect();
        println!(
            "{}  {:<8} {:<10} {:<20} {}  {}",
            task.id,
            task.kind,
            task.status,
            task.channel_id.as_deref().unwrap_or("-"),
            task.created_at.format("%Y-%m-%d %H:%M:%S"),
            preview.replace('\n', " ")
        );
    }
    Ok(())
}

async fn run(config: BobConfig, store: Arc<SqliteStore>, dry_run: bool) -> Result<()> {
    let poll = Duration::from_millis(config.scheduler.poll_interval_ms);
    let send_timeout = Duration::from_secs(config.scheduler.send_timeout_secs);
    let generation_timeout = Duration::from_secs(config.llm.timeout_secs);
    let generator: Arc<dyn Generator> = Arc::from(bobbot_providers::create_generator(&config.llm)?);

    let mut scheduler = DispatchScheduler::new();
    scheduler.add_collaborator(store.clone());

    println!("🐍 BobBot v{}", env!("CARGO_PKG_VERSION"));
    println!("   🧠 Model:    {} ({})", config.llm.model, generator.name());
    println!("   🗄️  Database: {}", config.db_path().display());
    if dry_run {
        println!("   🧪 Dry run:  deliveries are logged, not sent");
    }
    println!();

    // Discord: inbound always when configured, outbound unless dry-run
    let discord = config
        .channel
        .discord
        .clone()
        .filter(|d| d.enabled && !d.bot_token.trim().is_empty())
        .map(|d| Arc::new(DiscordChannel::new(d)));
    let discord_limit = config
        .channel
        .discord
        .as_ref()
        .map(|d| d.message_limit)
        .unwrap_or(2000);
    let discord_out: Option<Arc<dyn Channel>> = match (&discord, dry_run) {
        (_, true) => Some(Arc::new(LogChannel::targeted("discord", discord_limit))),
        (Some(discord), false) => Some(discord.clone()),
        (None, false) => None,
    };
    if let Some(discord) = &discord {
        scheduler.add_collaborator(discord.clone());
        scheduler.add_job(Arc::new(IngestJob::new(
            discord.clone(),
            store.clone(),
            Duration::from_millis(config.chat.poll_interval_ms),
        )));
    }

    let x = config
        .channel
        .x
        .clone()
        .filter(|x| x.enabled && !x.access_token.trim().is_empty())
        .map(|x| Arc::new(XChannel::new(x)));
    let x_limit = config.channel.x.as_ref().map(|x| x.post_limit).unwrap_or(280);
    let x_out: Option<Arc<dyn Channel>> = match (&x, dry_run) {
        (_, true) => Some(Arc::new(LogChannel::broadcast("x", x_limit))),
        (Some(x), false) => {
            scheduler.add_collaborator(x.clone());
            Some(x.clone())
        }
        (None, false) => None,
    };

    for (kind, channel) in [(TaskKind::Discord, discord_out), (TaskKind::X, x_out)] {
        match channel {
            Some(channel) => {
                let handler = Arc::new(DeliveryHandler::new(channel, kind.clone(), send_timeout));
                scheduler.add_job(Arc::new(ChannelWorker::new(
                    kind.as_str(),
                    handler,
                    store.clone(),
                    poll,
                )));
            }
            None => tracing::warn!("No {kind} channel configured; {kind} tasks will stay pending"),
        }
    }
    scheduler.add_job(Arc::new(ChannelWorker::new(
        "ai",
        Arc::new(GenerationHandler::new(
            generator.clone(),
            config.identity.system_prompt.clone(),
            generation_timeout,
        )),
        store.clone(),
        poll,
    )));

    if config.chat.enabled && discord.is_some() {
        // messages stored by earlier runs are context, not prompts
        let seen = store.latest_message_seq().await?;
        scheduler.add_job(Arc::new(
            ChatResponder::new(
                generator.clone(),
                store.clone(),
                store.clone(),
                config.identity.clone(),
                config.chat.clone(),
                generation_timeout,
            )
            .starting_after(seen),
        ));
    }
    if config.journal.enabled {
        scheduler.add_job(Arc::new(JournalComposer::new(
            generator.clone(),
            store.clone(),
            store.clone(),
            config.identity.clone(),
            config.journal.clone(),
            config.chat.journal_channel.clone(),
            config.chat.memory_limit,
            generation_timeout,
        )));
    }
    if config.tweet.enabled {
        scheduler.add_job(Arc::new(TweetComposer::new(
            generator.clone(),
            store.clone(),
            store.clone(),
            config.identity.clone(),
            config.tweet.clone(),
            config.journal.history_limit,
            generation_timeout,
        )));
    }

    scheduler.run_until(shutdown_signal()).await?;
    tracing::info!("👋 BobBot stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                }
                return;
            }
            Err(e) => tracing::warn!("SIGTERM handler unavailable: {e}"),
        }
    }
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received SIGINT"),
        Err(e) => {
            tracing::error!("Cannot listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::parse_from(["bobbot", "--db", "/tmp/b.db", "run", "--dry-run"]);
        assert_eq!(cli.db.as_deref(), Some("/tmp/b.db"));
        assert!(matches!(cli.command, Commands::Run { dry_run: true }));

        let cli = Cli::parse_from(["bobbot", "tasks", "--status", "pending", "-v"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Tasks { status, limit, .. } => {
                assert_eq!(status.as_deref(), Some("pending"));
                assert_eq!(limit, 20);
            }
            _ => panic!("expected tasks"),
        }

        let cli = Cli::parse_from(["bobbot", "set-status", "task-1", "failed"]);
        assert!(matches!(cli.command, Commands::SetStatus { .. }));
    }
}
