//! Trait abstractions for runtime I/O
//!
//! These traits enable testing sessions with mock implementations.

use crate::intake::SubmissionRecord;
use crate::sheets::{SheetsError, SheetsLog};
use crate::telegram::{InlineKeyboardMarkup, TelegramClient, TelegramError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure of an external sink. Logged, never shown to the user.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sheets: {0}")]
    Sheets(#[from] SheetsError),
    #[error("Telegram: {0}")]
    Telegram(#[from] TelegramError),
}

/// Delivery of outbound messages to users
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send HTML text, optionally with an inline keyboard
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError>;

    /// Replace the text of an earlier message
    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError>;

    /// Acknowledge a button press
    async fn answer_callback(&self, callback_id: &str) -> Result<(), TelegramError>;
}

/// Append-only log of submissions
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn append(&self, record: &SubmissionRecord) -> Result<(), SinkError>;
}

/// Relay of submissions to the support team
#[async_trait]
pub trait SupportNotifier: Send + Sync {
    async fn notify(&self, record: &SubmissionRecord) -> Result<(), SinkError>;
}

// ============================================================================
// Production Adapters
// ============================================================================

#[async_trait]
impl Transport for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        TelegramClient::send_message(self, chat_id, text, keyboard, false).await
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        TelegramClient::edit_message_text(self, chat_id, message_id, text).await
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TelegramError> {
        self.answer_callback_query(callback_id).await
    }
}

#[async_trait]
impl SubmissionSink for SheetsLog {
    async fn append(&self, record: &SubmissionRecord) -> Result<(), SinkError> {
        SheetsLog::append(self, record).await?;
        Ok(())
    }
}

/// Adapter to post notifications into the support chat
pub struct TelegramNotifier {
    client: Arc<TelegramClient>,
    chat_id: i64,
}

impl TelegramNotifier {
    pub fn new(client: Arc<TelegramClient>, chat_id: i64) -> Self {
        Self { client, chat_id }
    }
}

#[async_trait]
impl SupportNotifier for TelegramNotifier {
    async fn notify(&self, record: &SubmissionRecord) -> Result<(), SinkError> {
        self.client
            .send_message(self.chat_id, &record.render_notification(), None, true)
            .await?;
        tracing::info!(
            user_id = %record.user_id,
            support_chat_id = self.chat_id,
            "Support chat notified"
        );
        Ok(())
    }
}
