//! Intake conversation state machine
//!
//! A fixed transition table drives a single linear dialogue. The engine
//! mutates an explicit [`Conversation`] value and returns the effects the
//! runtime must deliver.

mod conversation;
mod effect;
mod engine;
mod handlers;
pub mod stage;
mod store;
mod table;

#[cfg(test)]
mod proptests;

pub use conversation::{field, Conversation, Fields};
pub use effect::Effect;
pub use engine::TransitionEngine;
pub use stage::{Action, Stage};
pub use store::{ConversationStore, InMemoryConversationStore};
pub use table::TransitionTable;

/// Telegram user identifier. Conversations are keyed by it.
pub type UserId = i64;
