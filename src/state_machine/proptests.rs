//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_stage() -> impl Strategy<Value = Stage> {
    prop_oneof![
        Just(Stage::Start),
        Just(Stage::WaitingForQuestion),
        Just(Stage::WaitingForSummary),
        Just(Stage::Finished),
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![Just(Action::Next), Just(Action::Back), Just(Action::Cancel)]
}

fn arb_fields() -> impl Strategy<Value = Fields> {
    proptest::collection::btree_map(
        prop_oneof![
            Just(field::QUERY.to_string()),
            Just(field::USER_ID.to_string()),
            Just(field::USER_NAME.to_string()),
            Just(field::DATE.to_string()),
            Just(field::ID_QUERY.to_string()),
        ],
        "[a-zA-Z0-9 ]{0,20}",
        0..5,
    )
}

fn arb_conversation() -> impl Strategy<Value = Conversation> {
    (proptest::option::of(arb_stage()), arb_fields()).prop_map(|(stage, fields)| {
        let mut conv = stage.map_or_else(Conversation::new, Conversation::at);
        conv.update_fields(fields);
        conv
    })
}

// ============================================================================
// Invariants
// ============================================================================

proptest! {
    /// A successful transition either lands on the table's target or, when
    /// the target auto-advances, finishes the conversation.
    #[test]
    fn prop_transition_follows_table(stage in arb_stage(), action in arb_action(), fields in arb_fields()) {
        let engine = TransitionEngine::default();
        let mut conv = Conversation::at(stage);
        conv.update_fields(fields);

        let expected = engine.table().next_stage(stage, action);
        let result = engine.handle_transition(1, &mut conv, action);

        match expected {
            None => prop_assert!(result.is_err()),
            Some(target) => {
                let outcome = result.unwrap();
                match target {
                    Stage::WaitingForSummary => {
                        prop_assert_eq!(outcome.entered, vec![Stage::WaitingForSummary, Stage::Finished]);
                        prop_assert!(conv.is_empty());
                    }
                    Stage::Finished => {
                        prop_assert_eq!(outcome.entered, vec![Stage::Finished]);
                        prop_assert!(conv.is_empty());
                    }
                    Stage::WaitingForQuestion => {
                        prop_assert_eq!(outcome.entered, vec![Stage::WaitingForQuestion]);
                        prop_assert_eq!(conv.stage(), Some(Stage::WaitingForQuestion));
                    }
                    Stage::Start => {
                        prop_assert!(outcome.entered.is_empty());
                        prop_assert_eq!(conv.stage(), Some(Stage::Start));
                    }
                }
            }
        }
    }

    /// Failed transitions never mutate the conversation
    #[test]
    fn prop_rejected_transition_is_noop(conv in arb_conversation(), action in arb_action()) {
        let engine = TransitionEngine::default();
        let mut after = conv.clone();

        if engine.handle_transition(1, &mut after, action).is_err() {
            prop_assert_eq!(after, conv);
        }
    }

    /// Each entered stage contributes exactly one outbound message
    #[test]
    fn prop_one_message_per_entry(conv in arb_conversation(), action in arb_action()) {
        let engine = TransitionEngine::default();
        let mut conv = conv;

        if let Ok(outcome) = engine.handle_transition(1, &mut conv, action) {
            prop_assert_eq!(outcome.entered.len(), outcome.effects.len());
        }
    }

    /// No sequence of actions leaves a conversation stuck in a terminal stage
    #[test]
    fn prop_never_rests_in_finished(actions in proptest::collection::vec(arb_action(), 0..20)) {
        let engine = TransitionEngine::default();
        let mut conv = Conversation::at(Stage::Start);

        for action in actions {
            let _ = engine.handle_transition(1, &mut conv, action);
            prop_assert_ne!(conv.stage(), Some(Stage::Finished));
            if !conv.is_active() {
                prop_assert!(conv.fields().is_empty());
                conv.set_stage(Stage::Start);
            }
        }
    }
}
