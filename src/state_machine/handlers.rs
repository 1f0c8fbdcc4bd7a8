//! Stage entry handlers
//!
//! One handler per stage, dispatched by exhaustive match. A handler may
//! mutate the conversation and ask the engine for a follow-up action.

use super::{field, Action, Conversation, Effect, Stage};
use crate::texts;

/// What entering a stage produced
#[derive(Debug, Default)]
pub(crate) struct StageEntry {
    pub effects: Vec<Effect>,
    /// Action to request immediately, without waiting for the user
    pub follow_up: Option<Action>,
}

impl StageEntry {
    fn reply(text: impl Into<String>) -> Self {
        Self {
            effects: vec![Effect::reply(text)],
            follow_up: None,
        }
    }

    fn then(mut self, action: Action) -> Self {
        self.follow_up = Some(action);
        self
    }
}

/// Run the entry handler for `stage`. `None` when the stage has none.
pub(crate) fn enter(stage: Stage, conversation: &mut Conversation) -> Option<StageEntry> {
    match stage {
        // Synthetic stage: only ever a source of `next`
        Stage::Start => None,
        Stage::WaitingForQuestion => Some(StageEntry::reply(texts::QUESTION_PROMPT)),
        Stage::WaitingForSummary => {
            Some(StageEntry::reply(render_summary(conversation)).then(Action::Next))
        }
        Stage::Finished => {
            conversation.clear();
            Some(StageEntry::reply(texts::THANKS_TEXT))
        }
    }
}

/// Confirmation message built from the collected fields.
///
/// Missing fields render as placeholder text.
pub(crate) fn render_summary(conversation: &Conversation) -> String {
    let get = |key: &str, placeholder: &str| {
        texts::escape_html(conversation.field(key).unwrap_or(placeholder))
    };
    let user_name = get(field::USER_NAME, texts::UNKNOWN_USER);
    let user_id = get(field::USER_ID, texts::NOT_AVAILABLE);
    let id_query = get(field::ID_QUERY, texts::NOT_AVAILABLE);
    let query = get(field::QUERY, texts::QUERY_NOT_SAVED);
    let date = get(field::DATE, texts::DATE_NOT_SAVED);

    format!(
        "<b>❕ Request summary ❕</b>\n\n\
         👤 <b>{user_name}</b> (ID: {user_id})\n\n\
         <i>Your request 🆔:</i> <b>{id_query}</b>\n\
         📝 <i>Description:</i> <b>{query}</b>\n\n\
         📅 <i>Submitted:</i> <b>{date}</b>\n\
         Accepted for review. We will let you know the outcome."
    )
}
