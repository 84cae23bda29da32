//! UML Student Bot - Main Entry Point
//!
//! Long-running Telegram bot for Universidad Martin Lutero students.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use teloxide::Bot;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use uml_student_bot::commands::CommandHandler;
use uml_student_bot::config::BotConfig;
use uml_student_bot::knowledge::{CacheRefresher, KnowledgeCache, RefresherMessage};
use uml_student_bot::qa::{QaForwarder, WebhookClient};
use uml_student_bot::scheduler::{ReminderScheduler, SchedulerMessage, SubscriberRegistry};
use uml_student_bot::sheets::GoogleSheetsClient;
use uml_student_bot::telegram::{RateLimiter, TelegramNotifier, run_dispatcher};

/// Telegram Bot API allows roughly this many messages per second overall.
const BROADCAST_MESSAGES_PER_SECOND: u32 = 20;

/// Telegram bot answering university students from a spreadsheet.
#[derive(Parser, Debug)]
#[command(name = "student_bot")]
#[command(about = "Telegram bot for Universidad Martin Lutero students")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let config = BotConfig::from_env().context("Failed to load configuration from environment")?;
    info!(
        "Configuration loaded (spreadsheet {}, {} admins)",
        config.sheets.spreadsheet_id,
        config.admin_user_ids.len()
    );

    let sheets = Arc::new(
        GoogleSheetsClient::new(&config.sheets).context("Failed to create Sheets client")?,
    );
    let cache = Arc::new(KnowledgeCache::new(sheets));
    let subscribers = Arc::new(SubscriberRegistry::open(&config.subscribers_path));
    info!("{} chats subscribed to reminders", subscribers.len());

    let webhook = WebhookClient::new(&config.webhook).context("Failed to create webhook client")?;
    let forwarder = Arc::new(QaForwarder::new(Arc::new(webhook), config.webhook.timeout));

    let bot = Bot::new(&config.telegram_token);
    let notifier = Arc::new(TelegramNotifier::new(
        bot.clone(),
        RateLimiter::per_second(BROADCAST_MESSAGES_PER_SECOND),
    ));

    let handler = Arc::new(CommandHandler::new(
        Arc::clone(&cache),
        Arc::clone(&subscribers),
        config.admin_user_ids.clone(),
    ));

    // Background tasks
    let (refresher_tx, refresher_rx) = mpsc::channel::<RefresherMessage>(8);
    let refresher = CacheRefresher::new(Arc::clone(&cache), config.cache_refresh_interval);
    let refresher_handle = tokio::spawn(async move {
        refresher.run(refresher_rx).await;
    });

    let (scheduler_tx, scheduler_rx) = mpsc::channel::<SchedulerMessage>(8);
    let scheduler = ReminderScheduler::new(
        Arc::clone(&cache),
        Arc::clone(&subscribers),
        notifier,
        config.reminders.clone(),
    );
    let scheduler_handle = tokio::spawn(scheduler.run(scheduler_rx));

    info!("Bot is running. Use Ctrl+C to stop.");
    run_dispatcher(bot, handler, forwarder).await;

    // Cleanup
    info!("Shutting down...");
    let _ = refresher_tx.send(RefresherMessage::Shutdown).await;
    let _ = scheduler_tx.send(SchedulerMessage::Shutdown).await;
    let _ = refresher_handle.await;
    let _ = scheduler_handle.await;

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
