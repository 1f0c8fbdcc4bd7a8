//! Support intake bot
//!
//! Walks Telegram users through a short conversation that captures one
//! support question, logs it to a spreadsheet and relays it to the
//! support chat.

mod config;
mod intake;
mod runtime;
mod sheets;
mod state_machine;
mod telegram;
mod texts;

use config::BotConfig;
use runtime::{
    run_polling, Services, SessionManager, SubmissionSink, SupportNotifier, TelegramNotifier,
};
use sheets::SheetsLog;
use state_machine::{InMemoryConversationStore, Stage, TransitionEngine};
use std::sync::Arc;
use telegram::{BotCommand, TelegramClient};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "support_intake=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = BotConfig::from_env()?;
    tracing::info!(
        timezone = %config.timezone,
        poll_timeout_secs = config.poll_timeout.as_secs(),
        "Configuration loaded"
    );

    let client = Arc::new(TelegramClient::new(
        &config.telegram_api_url,
        &config.telegram_token,
        config.poll_timeout,
    )?);

    if let Err(e) = client.delete_webhook(true).await {
        tracing::warn!(error = %e, "Failed to delete webhook");
    }
    let commands = [BotCommand {
        command: "start".to_string(),
        description: texts::START_COMMAND_DESCRIPTION.to_string(),
    }];
    if let Err(e) = client.set_my_commands(&commands).await {
        tracing::warn!(error = %e, "Failed to register bot commands");
    }

    let sink: Option<Arc<dyn SubmissionSink>> = match config.sheets {
        Some(sheets) => {
            let log = SheetsLog::new(sheets)?;
            tracing::info!(worksheet = %log.worksheet(), "Submission log enabled");
            Some(Arc::new(log))
        }
        None => {
            tracing::warn!("Google Sheets not configured, submissions will not be logged");
            None
        }
    };

    let notifier: Option<Arc<dyn SupportNotifier>> = match config.support_chat_id {
        Some(chat_id) => {
            tracing::info!(support_chat_id = chat_id, "Support chat notifications enabled");
            Some(Arc::new(TelegramNotifier::new(client.clone(), chat_id)))
        }
        None => {
            tracing::warn!("SUPPORT_CHAT_ID not set, support chat will not be notified");
            None
        }
    };

    let engine = Arc::new(TransitionEngine::default());
    for stage in Stage::ALL {
        tracing::debug!(
            stage = %stage,
            actions = ?engine.table().actions_from(stage),
            "Transition table"
        );
    }

    let services = Services {
        engine,
        store: Arc::new(InMemoryConversationStore::new()),
        transport: client.clone(),
        sink,
        notifier,
        timezone: config.timezone,
    };
    let manager = SessionManager::new(services);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            tracing::info!("Shutdown requested");
            cancel.cancel();
        }
    });

    run_polling(&client, &manager, cancel).await;
    manager.shutdown().await;

    tracing::info!("Bot stopped");
    Ok(())
}
