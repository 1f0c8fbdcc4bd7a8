//! Per-user session worker
//!
//! Turns inbound events into engine actions and store updates, delivers
//! the resulting messages, and runs the external sinks in the background.

use super::{Inbound, InboundKind, Sender, Services, SessionSlot};
use crate::intake::{capture_question, SubmissionRecord};
use crate::state_machine::{Action, Effect, Stage, UserId};
use crate::telegram::create_inline_keyboard;
use crate::texts;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

pub struct UserSession {
    user: UserId,
    services: Services,
    /// Sink and notifier calls still in flight
    background: JoinSet<()>,
}

impl UserSession {
    pub fn new(user: UserId, services: Services) -> Self {
        Self {
            user,
            services,
            background: JoinSet::new(),
        }
    }

    /// Process events until the session goes idle or the channel closes.
    ///
    /// Idle means no conversation, no queued events and no background work;
    /// the session then gives up its slot and exits.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Inbound>, slot: SessionSlot) {
        tracing::debug!(user_id = self.user, "Session started");

        loop {
            tokio::select! {
                Some(inbound) = rx.recv() => self.process(inbound).await,
                Some(joined) = self.background.join_next() => {
                    if let Err(e) = joined {
                        tracing::error!(user_id = self.user, error = %e, "Background task failed");
                    }
                }
                else => break,
            }

            if self.is_idle().await && slot.release(&rx).await {
                tracing::debug!(user_id = self.user, "Session idle, releasing");
                break;
            }
        }

        tracing::debug!(user_id = self.user, "Session stopped");
    }

    async fn is_idle(&self) -> bool {
        self.background.is_empty()
            && self.services.store.get_stage(self.user).await.is_none()
            && self.services.store.get_fields(self.user).await.is_empty()
    }

    /// Handle one inbound event to completion, including chained transitions
    pub async fn process(&mut self, inbound: Inbound) {
        let Inbound {
            sender,
            chat_id,
            kind,
        } = inbound;

        match kind {
            InboundKind::Command { name, .. } if name == "start" => {
                self.handle_start(&sender, chat_id).await;
            }
            InboundKind::Callback {
                callback_id,
                data,
                message_id,
            } => {
                self.handle_callback(chat_id, &callback_id, &data, message_id)
                    .await;
            }
            InboundKind::Command { raw, .. } => {
                self.handle_message(&sender, chat_id, Some(&raw)).await;
            }
            InboundKind::Text { text } => {
                self.handle_message(&sender, chat_id, Some(&text)).await;
            }
            InboundKind::NonText => self.handle_message(&sender, chat_id, None).await,
        }
    }

    /// `/start`: drop any conversation and offer the start button
    async fn handle_start(&self, sender: &Sender, chat_id: i64) {
        self.services.store.clear(self.user).await;
        tracing::info!(user_id = self.user, name = %sender.first_name, "User sent /start");

        let keyboard =
            create_inline_keyboard([(texts::START_BUTTON_TEXT, texts::START_QUERY_CALLBACK)], 1);
        if let Err(e) = self
            .services
            .transport
            .send_message(chat_id, &texts::welcome(&sender.first_name), Some(&keyboard))
            .await
        {
            tracing::error!(user_id = self.user, error = %e, "Failed to send welcome");
        }
    }

    /// Start button: set the synthetic `start` stage and move on from it
    async fn handle_callback(
        &self,
        chat_id: i64,
        callback_id: &str,
        data: &str,
        message_id: Option<i64>,
    ) {
        if let Err(e) = self.services.transport.answer_callback(callback_id).await {
            tracing::warn!(user_id = self.user, error = %e, "Failed to answer callback");
        }

        if data != texts::START_QUERY_CALLBACK {
            tracing::debug!(user_id = self.user, data, "Ignoring unknown callback");
            return;
        }
        if let Some(stage) = self.services.store.get_stage(self.user).await {
            tracing::info!(user_id = self.user, stage = %stage, "Start button pressed mid-conversation, ignoring");
            return;
        }
        tracing::info!(user_id = self.user, "Start button pressed");

        if let Some(message_id) = message_id {
            if let Err(e) = self
                .services
                .transport
                .edit_message_text(chat_id, message_id, texts::FEEDBACK_TEXT)
                .await
            {
                tracing::warn!(user_id = self.user, message_id, error = %e, "Failed to replace start button");
            }
        }

        self.services.store.set_stage(self.user, Stage::Start).await;
        self.transition(chat_id, Action::Next).await;
    }

    /// Text while waiting for a question: capture, log, relay, move on
    async fn handle_message(&mut self, sender: &Sender, chat_id: i64, raw: Option<&str>) {
        let stage = self.services.store.get_stage(self.user).await;
        if stage != Some(Stage::WaitingForQuestion) {
            tracing::debug!(user_id = self.user, ?stage, "Ignoring message outside question capture");
            return;
        }

        let query = match capture_question(raw) {
            Ok(query) => query,
            Err(e) => {
                tracing::warn!(user_id = self.user, reason = %e, "Rejected question input");
                self.reply(chat_id, texts::REENTER_AS_TEXT).await;
                return;
            }
        };

        let record = SubmissionRecord::now(
            self.user,
            &sender.display_name,
            query,
            self.services.timezone,
        );
        tracing::info!(
            user_id = self.user,
            user_name = %record.user_name,
            id_query = %record.id_query,
            date = %record.date,
            "Question received"
        );

        self.services
            .store
            .update_fields(self.user, record.conversation_fields())
            .await;
        self.hand_off(record);
        self.transition(chat_id, Action::Next).await;
    }

    /// Fire-and-forget delivery of `record` to the sinks
    fn hand_off(&mut self, record: SubmissionRecord) {
        let user = self.user;
        let sink = self.services.sink.clone();
        let notifier = self.services.notifier.clone();

        self.background.spawn(async move {
            match sink {
                Some(sink) => match sink.append(&record).await {
                    Ok(()) => tracing::info!(user_id = user, "Submission logged"),
                    Err(e) => tracing::error!(user_id = user, error = %e, "Failed to log submission"),
                },
                None => tracing::warn!(user_id = user, "Submission log is not configured"),
            }

            match notifier {
                Some(notifier) => {
                    if let Err(e) = notifier.notify(&record).await {
                        tracing::error!(user_id = user, error = %e, "Failed to notify support chat");
                    }
                }
                None => tracing::error!(user_id = user, "Support chat is not configured"),
            }
        });
    }

    /// Run the engine on the stored conversation and deliver its effects
    async fn transition(&self, chat_id: i64, action: Action) {
        let mut conversation = self.services.store.load(self.user).await;

        match self
            .services
            .engine
            .handle_transition(self.user, &mut conversation, action)
        {
            Ok(outcome) => {
                self.services.store.save(self.user, conversation).await;
                for effect in outcome.effects {
                    self.execute_effect(chat_id, effect).await;
                }
            }
            Err(e) => {
                tracing::debug!(user_id = self.user, error = %e, "Event dropped");
            }
        }
    }

    async fn execute_effect(&self, chat_id: i64, effect: Effect) {
        match effect {
            Effect::Reply { text } => self.reply(chat_id, &text).await,
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self
            .services
            .transport
            .send_message(chat_id, text, None)
            .await
        {
            tracing::error!(user_id = self.user, error = %e, "Failed to send message");
        }
    }

    /// Wait for all background sink work
    #[cfg(test)]
    pub async fn drain_background(&mut self) {
        while let Some(joined) = self.background.join_next().await {
            joined.unwrap();
        }
    }
}
