//! Mock implementations for testing
//!
//! These mocks enable session and manager tests without real I/O.

use super::traits::*;
use super::{Inbound, InboundKind, Sender, Services};
use crate::intake::SubmissionRecord;
use crate::state_machine::{InMemoryConversationStore, TransitionEngine, UserId};
use crate::telegram::{InlineKeyboardMarkup, TelegramError, TelegramErrorKind};
use chrono_tz::Tz;
use crate::texts;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Transport
// ============================================================================

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

/// Transport that records everything it is asked to deliver
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentMessage>>,
    edits: Mutex<Vec<String>>,
    answered: Mutex<Vec<String>>,
    failing: AtomicBool,
    held: AtomicBool,
}

impl MockTransport {
    /// Make `send_message` wait until [`MockTransport::release`]
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
    }

    /// Make every call fail from now on (calls are still recorded)
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn result(&self) -> Result<(), TelegramError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(TelegramError::new(TelegramErrorKind::Network, "mock transport failure"))
        } else {
            Ok(())
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts sent to the private chat of `user`
    pub fn texts_for(&self, user: UserId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.chat_id == user)
            .map(|m| m.text.clone())
            .collect()
    }

    pub fn edits(&self) -> Vec<String> {
        self.edits.lock().unwrap().clone()
    }

    pub fn answered(&self) -> Vec<String> {
        self.answered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        while self.held.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        self.sent.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        self.result()
    }

    async fn edit_message_text(
        &self,
        _chat_id: i64,
        _message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        self.edits.lock().unwrap().push(text.to_string());
        self.result()
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TelegramError> {
        self.answered.lock().unwrap().push(callback_id.to_string());
        self.result()
    }
}

// ============================================================================
// Mock Sinks
// ============================================================================

/// Records submissions; serves as both the log and the support notifier
#[derive(Default)]
pub struct MockSink {
    records: Mutex<Vec<SubmissionRecord>>,
    failing: AtomicBool,
}

impl MockSink {
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<SubmissionRecord> {
        self.records.lock().unwrap().clone()
    }

    fn record(&self, record: &SubmissionRecord) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TelegramError::new(TelegramErrorKind::ServerError, "mock sink failure").into());
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[async_trait]
impl SubmissionSink for MockSink {
    async fn append(&self, record: &SubmissionRecord) -> Result<(), SinkError> {
        self.record(record)
    }
}

#[async_trait]
impl SupportNotifier for MockSink {
    async fn notify(&self, record: &SubmissionRecord) -> Result<(), SinkError> {
        self.record(record)
    }
}

// ============================================================================
// Test Environment
// ============================================================================

/// Mocks wired into a [`Services`] bundle, kept around for assertions
pub struct TestServices {
    pub store: Arc<InMemoryConversationStore>,
    pub transport: Arc<MockTransport>,
    pub sink: Arc<MockSink>,
    pub notifier: Arc<MockSink>,
}

impl TestServices {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryConversationStore::new()),
            transport: Arc::new(MockTransport::default()),
            sink: Arc::new(MockSink::default()),
            notifier: Arc::new(MockSink::default()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            engine: Arc::new(TransitionEngine::default()),
            store: self.store.clone(),
            transport: self.transport.clone(),
            sink: Some(self.sink.clone()),
            notifier: Some(self.notifier.clone()),
            timezone: Tz::UTC,
        }
    }

    /// Inbound event from `user` in their private chat
    pub fn inbound(user: UserId, kind: InboundKind) -> Inbound {
        Inbound {
            sender: Sender {
                id: user,
                first_name: "User".to_string(),
                display_name: format!("user{user}"),
            },
            chat_id: user,
            kind,
        }
    }

    pub fn command(user: UserId, name: &str) -> Inbound {
        Self::inbound(
            user,
            InboundKind::Command {
                name: name.to_string(),
                raw: format!("/{name}"),
            },
        )
    }

    pub fn text(user: UserId, text: &str) -> Inbound {
        Self::inbound(
            user,
            InboundKind::Text {
                text: text.to_string(),
            },
        )
    }

    pub fn non_text(user: UserId) -> Inbound {
        Self::inbound(user, InboundKind::NonText)
    }

    pub fn start_button(user: UserId) -> Inbound {
        Self::inbound(
            user,
            InboundKind::Callback {
                callback_id: format!("cb-{user}"),
                data: texts::START_QUERY_CALLBACK.to_string(),
                message_id: Some(1),
            },
        )
    }
}
