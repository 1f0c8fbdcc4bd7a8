//! Transition engine
//!
//! Looks up the table, moves the conversation to the next stage and runs
//! that stage's entry handler. Auto-advance requests from handlers are
//! processed in a loop, not by recursion.

use super::handlers;
use super::{Action, Conversation, Effect, Stage, TransitionTable, UserId};
use std::sync::Arc;
use thiserror::Error;

/// Protocol errors. None are fatal; the event is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("No active conversation for user {user}")]
    NoActiveConversation { user: UserId },
    #[error("No transition for action '{action}' from stage '{from}'")]
    NoTransition { from: Stage, action: Action },
}

/// Result of a (possibly chained) transition
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// Stages whose entry handler ran, in order
    pub entered: Vec<Stage>,
    /// Outbound effects, in order
    pub effects: Vec<Effect>,
}

impl TransitionOutcome {
    fn absorb(&mut self, stage: Stage, entry: handlers::StageEntry) {
        self.entered.push(stage);
        self.effects.extend(entry.effects);
    }
}

/// Drives conversations through the transition table
#[derive(Debug, Clone)]
pub struct TransitionEngine {
    table: Arc<TransitionTable>,
}

impl TransitionEngine {
    pub fn new(table: Arc<TransitionTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Apply `action` to `conversation`.
    ///
    /// On error the conversation is left untouched and no handler runs. If a
    /// chained auto-advance step fails, the effects produced so far are
    /// still returned.
    pub fn handle_transition(
        &self,
        user: UserId,
        conversation: &mut Conversation,
        action: Action,
    ) -> Result<TransitionOutcome, TransitionError> {
        let mut outcome = TransitionOutcome::default();
        let mut pending = Some(action);

        while let Some(action) = pending.take() {
            match self.step(user, conversation, action, &mut outcome) {
                Ok(follow_up) => pending = follow_up,
                Err(e) if outcome.entered.is_empty() => return Err(e),
                Err(e) => {
                    tracing::warn!(user_id = user, error = %e, "Chained transition stopped");
                    break;
                }
            }
        }

        Ok(outcome)
    }

    fn step(
        &self,
        user: UserId,
        conversation: &mut Conversation,
        action: Action,
        outcome: &mut TransitionOutcome,
    ) -> Result<Option<Action>, TransitionError> {
        let Some(current) = conversation.stage() else {
            tracing::error!(user_id = user, action = %action, "Current stage is not set");
            return Err(TransitionError::NoActiveConversation { user });
        };

        let Some(next) = self.table.next_stage(current, action) else {
            tracing::warn!(
                user_id = user,
                from = %current,
                action = %action,
                "No transition for action"
            );
            return Err(TransitionError::NoTransition {
                from: current,
                action,
            });
        };

        conversation.set_stage(next);
        if action == Action::Back {
            tracing::info!(user_id = user, from = %current, to = %next, "Stepped back");
        } else {
            tracing::info!(user_id = user, from = %current, to = %next, action = %action, "Transition");
        }

        if next.is_terminal() {
            tracing::info!(user_id = user, "Conversation finished");
        }

        match handlers::enter(next, conversation) {
            Some(entry) => {
                let follow_up = entry.follow_up;
                if let Some(follow) = follow_up {
                    tracing::debug!(user_id = user, stage = %next, action = %follow, "Auto-advancing");
                }
                outcome.absorb(next, entry);
                Ok(follow_up)
            }
            None => {
                tracing::error!(user_id = user, stage = %next, "No entry handler for stage");
                Ok(None)
            }
        }
    }
}

impl Default for TransitionEngine {
    fn default() -> Self {
        Self::new(Arc::new(TransitionTable::intake()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::field;
    use crate::texts;

    const USER: UserId = 42;

    fn engine() -> TransitionEngine {
        TransitionEngine::default()
    }

    fn filled_question_stage() -> Conversation {
        let mut conv = Conversation::at(Stage::WaitingForQuestion);
        conv.update_fields([
            (field::QUERY, "help"),
            (field::USER_ID, "42"),
            (field::USER_NAME, "bob"),
            (field::DATE, "01.01.2025 10:00"),
            (field::ID_QUERY, "q_42_250101100000"),
        ]);
        conv
    }

    #[test]
    fn test_start_next_prompts_for_question() {
        let mut conv = Conversation::at(Stage::Start);
        let outcome = engine()
            .handle_transition(USER, &mut conv, Action::Next)
            .unwrap();

        assert_eq!(conv.stage(), Some(Stage::WaitingForQuestion));
        assert_eq!(outcome.entered, vec![Stage::WaitingForQuestion]);
        assert_eq!(outcome.effects, vec![Effect::reply(texts::QUESTION_PROMPT)]);
    }

    #[test]
    fn test_question_next_summarises_then_finishes() {
        let mut conv = filled_question_stage();
        let outcome = engine()
            .handle_transition(USER, &mut conv, Action::Next)
            .unwrap();

        assert_eq!(
            outcome.entered,
            vec![Stage::WaitingForSummary, Stage::Finished]
        );
        assert_eq!(outcome.effects.len(), 2);
        let summary = outcome.effects[0].text();
        for value in ["help", "42", "bob", "01.01.2025 10:00", "q_42_250101100000"] {
            assert!(summary.contains(value), "summary is missing {value}");
        }
        assert_eq!(outcome.effects[1], Effect::reply(texts::THANKS_TEXT));

        // Finished clears the conversation
        assert_eq!(conv.stage(), None);
        assert!(conv.fields().is_empty());
    }

    #[test]
    fn test_missing_query_uses_placeholder() {
        let mut conv = Conversation::at(Stage::WaitingForQuestion);
        conv.update_fields([(field::USER_NAME, "bob")]);
        let outcome = engine()
            .handle_transition(USER, &mut conv, Action::Next)
            .unwrap();

        assert!(outcome.effects[0].text().contains(texts::QUERY_NOT_SAVED));
        assert!(conv.is_empty());
    }

    #[test]
    fn test_no_active_conversation() {
        let mut conv = Conversation::new();
        let result = engine().handle_transition(USER, &mut conv, Action::Next);

        assert_eq!(
            result,
            Err(TransitionError::NoActiveConversation { user: USER })
        );
        assert!(conv.is_empty());
    }

    #[test]
    fn test_undefined_action_leaves_stage() {
        let mut conv = Conversation::at(Stage::WaitingForQuestion);
        conv.update_fields([(field::QUERY, "keep me")]);
        let before = conv.clone();

        let result = engine().handle_transition(USER, &mut conv, Action::Cancel);

        assert_eq!(
            result,
            Err(TransitionError::NoTransition {
                from: Stage::WaitingForQuestion,
                action: Action::Cancel,
            })
        );
        assert_eq!(conv, before);
    }

    #[test]
    fn test_back_to_start_has_no_handler() {
        let mut conv = Conversation::at(Stage::WaitingForQuestion);
        let outcome = engine()
            .handle_transition(USER, &mut conv, Action::Back)
            .unwrap();

        assert_eq!(conv.stage(), Some(Stage::Start));
        assert!(outcome.entered.is_empty());
        assert!(outcome.effects.is_empty());
    }

    #[test]
    fn test_back_from_summary_loops_and_auto_advances() {
        let mut conv = Conversation::at(Stage::WaitingForSummary);
        let outcome = engine()
            .handle_transition(USER, &mut conv, Action::Back)
            .unwrap();

        assert_eq!(
            outcome.entered,
            vec![Stage::WaitingForSummary, Stage::Finished]
        );
        assert!(conv.is_empty());
    }

    #[test]
    fn test_cancel_from_summary_returns_to_start() {
        let mut conv = Conversation::at(Stage::WaitingForSummary);
        conv.update_fields([(field::QUERY, "help")]);
        engine()
            .handle_transition(USER, &mut conv, Action::Cancel)
            .unwrap();

        assert_eq!(conv.stage(), Some(Stage::Start));
        assert_eq!(conv.field(field::QUERY), Some("help"));
    }

    #[test]
    fn test_chained_failure_keeps_earlier_effects() {
        // Summary auto-advances but this table has no way out of it
        let table = TransitionTable::from_entries([(
            (Stage::WaitingForQuestion, Action::Next),
            Stage::WaitingForSummary,
        )]);
        let engine = TransitionEngine::new(Arc::new(table));
        let mut conv = Conversation::at(Stage::WaitingForQuestion);

        let outcome = engine
            .handle_transition(USER, &mut conv, Action::Next)
            .unwrap();

        assert_eq!(outcome.entered, vec![Stage::WaitingForSummary]);
        assert_eq!(conv.stage(), Some(Stage::WaitingForSummary));
    }
}
