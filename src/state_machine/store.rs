//! Conversation storage keyed by user id
//!
//! Backing storage is volatile: conversations do not survive a restart.
//! Callers must uphold single-writer-per-user; the runtime does this by
//! routing every event for a user through one worker task.

use super::{Conversation, Fields, Stage, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Storage for per-user conversations
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Current stage, or `None` when the user has no active conversation
    async fn get_stage(&self, user: UserId) -> Option<Stage>;

    /// Overwrite the current stage
    async fn set_stage(&self, user: UserId, stage: Stage);

    async fn get_fields(&self, user: UserId) -> Fields;

    /// Merge `partial` into the stored fields
    async fn update_fields(&self, user: UserId, partial: Fields);

    /// Reset stage and drop all fields
    async fn clear(&self, user: UserId);

    /// Snapshot of the whole conversation (empty when none exists)
    async fn load(&self, user: UserId) -> Conversation;

    /// Replace the whole conversation. An empty value removes the entry.
    async fn save(&self, user: UserId, conversation: Conversation);
}

/// In-memory store
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<UserId, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with stored state
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get_stage(&self, user: UserId) -> Option<Stage> {
        self.conversations
            .read()
            .await
            .get(&user)
            .and_then(Conversation::stage)
    }

    async fn set_stage(&self, user: UserId, stage: Stage) {
        self.conversations
            .write()
            .await
            .entry(user)
            .or_default()
            .set_stage(stage);
    }

    async fn get_fields(&self, user: UserId) -> Fields {
        self.conversations
            .read()
            .await
            .get(&user)
            .map(|conv| conv.fields().clone())
            .unwrap_or_default()
    }

    async fn update_fields(&self, user: UserId, partial: Fields) {
        self.conversations
            .write()
            .await
            .entry(user)
            .or_default()
            .update_fields(partial);
    }

    async fn clear(&self, user: UserId) {
        self.conversations.write().await.remove(&user);
    }

    async fn load(&self, user: UserId) -> Conversation {
        self.conversations
            .read()
            .await
            .get(&user)
            .cloned()
            .unwrap_or_default()
    }

    async fn save(&self, user: UserId, conversation: Conversation) {
        let mut conversations = self.conversations.write().await;
        if conversation.is_empty() {
            conversations.remove(&user);
        } else {
            conversations.insert(user, conversation);
        }
    }
}

#[async_trait]
impl<T: ConversationStore + ?Sized> ConversationStore for Arc<T> {
    async fn get_stage(&self, user: UserId) -> Option<Stage> {
        (**self).get_stage(user).await
    }

    async fn set_stage(&self, user: UserId, stage: Stage) {
        (**self).set_stage(user, stage).await;
    }

    async fn get_fields(&self, user: UserId) -> Fields {
        (**self).get_fields(user).await
    }

    async fn update_fields(&self, user: UserId, partial: Fields) {
        (**self).update_fields(user, partial).await;
    }

    async fn clear(&self, user: UserId) {
        (**self).clear(user).await;
    }

    async fn load(&self, user: UserId) -> Conversation {
        (**self).load(user).await
    }

    async fn save(&self, user: UserId, conversation: Conversation) {
        (**self).save(user, conversation).await;
    }
}
