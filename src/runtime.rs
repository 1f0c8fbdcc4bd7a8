//! Runtime for driving intake conversations
//!
//! Every user gets one worker task fed through an mpsc channel, so events
//! for the same user are handled strictly one at a time while different
//! users proceed concurrently.

mod polling;
mod session;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use polling::run_polling;
pub use session::UserSession;
pub use traits::*;

use crate::state_machine::{ConversationStore, TransitionEngine, UserId};
use crate::telegram::Update;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

const SESSION_QUEUE_DEPTH: usize = 32;

/// Shared dependencies handed to every session
#[derive(Clone)]
pub struct Services {
    pub engine: Arc<TransitionEngine>,
    pub store: Arc<dyn ConversationStore>,
    pub transport: Arc<dyn Transport>,
    /// `None` when the spreadsheet log is not configured
    pub sink: Option<Arc<dyn SubmissionSink>>,
    /// `None` when no support chat is configured
    pub notifier: Option<Arc<dyn SupportNotifier>>,
    /// Zone for submission timestamps
    pub timezone: Tz,
}

/// Who sent an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    pub first_name: String,
    /// Username when set, else first name
    pub display_name: String,
}

/// Inbound event, already stripped of transport details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub sender: Sender,
    pub chat_id: i64,
    pub kind: InboundKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// `/name` message. `raw` is the full text.
    Command { name: String, raw: String },
    Text { text: String },
    /// Message with no text (photo, sticker, ...)
    NonText,
    /// Inline button press
    Callback {
        callback_id: String,
        data: String,
        message_id: Option<i64>,
    },
}

impl Inbound {
    /// Convert a Bot API update. `None` for updates the bot does not handle.
    pub fn from_update(update: Update) -> Option<Self> {
        if let Some(callback) = update.callback_query {
            let chat_id = callback
                .message
                .as_ref()
                .map_or(callback.from.id, |m| m.chat.id);
            return Some(Self {
                sender: Sender::from(&callback.from),
                chat_id,
                kind: InboundKind::Callback {
                    callback_id: callback.id,
                    data: callback.data.unwrap_or_default(),
                    message_id: callback.message.map(|m| m.message_id),
                },
            });
        }

        let message = update.message?;
        let from = message.from.as_ref().filter(|u| !u.is_bot)?;
        let kind = match message.text {
            Some(text) => match parse_command(&text) {
                Some(name) => InboundKind::Command {
                    name: name.to_string(),
                    raw: text,
                },
                None => InboundKind::Text { text },
            },
            None => InboundKind::NonText,
        };

        Some(Self {
            sender: Sender::from(from),
            chat_id: message.chat.id,
            kind,
        })
    }
}

impl From<&crate::telegram::User> for Sender {
    fn from(user: &crate::telegram::User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            display_name: user.display_name().to_string(),
        }
    }
}

/// `/start@my_bot args` -> `start`
fn parse_command(text: &str) -> Option<&str> {
    let word = text.strip_prefix('/')?.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    (!name.is_empty()).then_some(name)
}

/// Handle to a running user session
struct SessionHandle {
    tx: mpsc::Sender<Inbound>,
    task: JoinHandle<()>,
    /// Distinguishes a session from a later one for the same user
    generation: u64,
}

type SessionMap = Arc<Mutex<HashMap<UserId, SessionHandle>>>;

/// A session's own entry in the manager's routing map
pub struct SessionSlot {
    sessions: SessionMap,
    user: UserId,
    generation: u64,
}

impl SessionSlot {
    /// Stop routing to this session if nothing is queued for it.
    ///
    /// Returns true when the entry was removed; the session must then exit.
    /// Events are only queued while the map lock is held, so an empty queue
    /// seen under the lock stays empty.
    pub async fn release(&self, rx: &mpsc::Receiver<Inbound>) -> bool {
        let mut sessions = self.sessions.lock().await;
        let owned = sessions
            .get(&self.user)
            .is_some_and(|handle| handle.generation == self.generation);
        if !owned || !rx.is_empty() {
            return false;
        }
        sessions.remove(&self.user);
        true
    }
}

/// Routes inbound events to per-user sessions.
///
/// A session lives while its user has an active conversation or queued
/// events, and is started again on the next event after that.
pub struct SessionManager {
    services: Services,
    sessions: SessionMap,
    next_generation: AtomicU64,
}

impl SessionManager {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    fn spawn_session(&self, user: UserId) -> SessionHandle {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SESSION_QUEUE_DEPTH);
        let slot = SessionSlot {
            sessions: Arc::clone(&self.sessions),
            user,
            generation,
        };
        let session = UserSession::new(user, self.services.clone());
        let task = tokio::spawn(session.run(rx, slot));
        SessionHandle {
            tx,
            task,
            generation,
        }
    }

    /// Queue `inbound` on its user's session, starting one if needed.
    ///
    /// Never waits on a session: when a user's queue is full the event is
    /// dropped so other users are not held up.
    pub async fn dispatch(&self, inbound: Inbound) {
        let user = inbound.sender.id;
        let mut sessions = self.sessions.lock().await;
        let handle = sessions
            .entry(user)
            .or_insert_with(|| self.spawn_session(user));

        match handle.tx.try_send(inbound) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    user_id = user,
                    capacity = SESSION_QUEUE_DEPTH,
                    "Session queue full, dropping event"
                );
            }
            Err(TrySendError::Closed(inbound)) => {
                tracing::warn!(user_id = user, "Session worker gone, restarting");
                let handle = self.spawn_session(user);
                if handle.tx.try_send(inbound).is_err() {
                    tracing::error!(user_id = user, "Failed to deliver event to restarted session");
                }
                sessions.insert(user, handle);
            }
        }
    }

    /// Number of live sessions
    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Close every session and wait for in-flight work to finish
    pub async fn shutdown(&self) {
        let sessions: Vec<(UserId, SessionHandle)> =
            self.sessions.lock().await.drain().collect();
        tracing::info!(count = sessions.len(), "Stopping sessions");

        for (user, SessionHandle { tx, task, .. }) in sessions {
            drop(tx);
            if let Err(e) = task.await {
                tracing::error!(user_id = user, error = %e, "Session task failed");
            }
        }
    }
}
