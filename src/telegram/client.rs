//! HTTP client for the Bot API

use super::types::{
    AnswerCallbackQueryRequest, ApiResponse, BotCommand, DeleteWebhookRequest,
    EditMessageTextRequest, GetUpdatesRequest, InlineKeyboardMarkup, SendMessageRequest,
    SetMyCommandsRequest, Update,
};
use super::{TelegramError, TelegramErrorKind};
use crate::texts::split_message;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const PARSE_MODE: &str = "HTML";
const ALLOWED_UPDATES: &[&str] = &["message", "callback_query"];
/// Headroom on top of the long-poll timeout before the HTTP request gives up
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

pub struct TelegramClient {
    client: Client,
    base_url: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, poll_timeout: Duration) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .timeout(poll_timeout + REQUEST_TIMEOUT_SLACK)
            .build()
            .map_err(|e| {
                TelegramError::new(
                    TelegramErrorKind::Unknown,
                    format!("Failed to create HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
            poll_timeout,
        })
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, TelegramError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{method}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(params)
            .send()
            .await
            .map_err(|e| {
                // Never log the URL: it carries the bot token
                let e = e.without_url();
                let kind = if e.is_timeout() || e.is_connect() {
                    TelegramErrorKind::Network
                } else {
                    TelegramErrorKind::Unknown
                };
                TelegramError::new(kind, format!("{method} request failed: {e}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            TelegramError::new(
                TelegramErrorKind::Network,
                format!("Failed to read {method} response: {e}"),
            )
        })?;

        let reply: ApiResponse<R> = serde_json::from_str(&body).map_err(|e| {
            if status.is_server_error() {
                TelegramError::new(TelegramErrorKind::ServerError, format!("{method}: HTTP {status}"))
            } else {
                TelegramError::new(
                    TelegramErrorKind::Unknown,
                    format!("Failed to parse {method} response: {e} - body: {body}"),
                )
            }
        })?;

        if !reply.ok {
            return Err(TelegramError::from_api(
                reply.error_code.unwrap_or(status.as_u16()),
                reply.description.as_deref().unwrap_or("no description"),
                reply.parameters.and_then(|p| p.retry_after),
            ));
        }

        reply.result.ok_or_else(|| {
            TelegramError::new(
                TelegramErrorKind::Unknown,
                format!("{method}: ok reply without result"),
            )
        })
    }

    /// Long-poll for updates with ids >= `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            &GetUpdatesRequest {
                offset,
                timeout: self.poll_timeout.as_secs(),
                allowed_updates: ALLOWED_UPDATES,
            },
        )
        .await
    }

    /// Send HTML text, split into several messages when too long.
    ///
    /// The keyboard, if any, is attached to the last chunk.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
        disable_web_page_preview: bool,
    ) -> Result<(), TelegramError> {
        let mut chunks = split_message(text);
        if chunks.is_empty() {
            tracing::warn!(chat_id, "Empty message text");
            chunks.push("...".to_string());
        }
        let last = chunks.len() - 1;

        for (i, chunk) in chunks.iter().enumerate() {
            let _: serde_json::Value = self
                .call(
                    "sendMessage",
                    &SendMessageRequest {
                        chat_id,
                        text: chunk,
                        parse_mode: PARSE_MODE,
                        disable_web_page_preview,
                        reply_markup: if i == last { keyboard } else { None },
                    },
                )
                .await?;
        }
        Ok(())
    }

    /// Replace a message's text, dropping its inline keyboard
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                &EditMessageTextRequest {
                    chat_id,
                    message_id,
                    text,
                    parse_mode: PARSE_MODE,
                },
            )
            .await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), TelegramError> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &AnswerCallbackQueryRequest { callback_query_id },
            )
            .await?;
        Ok(())
    }

    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), TelegramError> {
        let _: bool = self
            .call("setMyCommands", &SetMyCommandsRequest { commands })
            .await?;
        Ok(())
    }

    /// Switch to polling mode, optionally discarding queued updates
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<(), TelegramError> {
        let _: bool = self
            .call(
                "deleteWebhook",
                &DeleteWebhookRequest {
                    drop_pending_updates,
                },
            )
            .await?;
        Ok(())
    }
}
