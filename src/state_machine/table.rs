//! Static (stage, action) -> stage lookup

use super::{Action, Stage};
use std::collections::HashMap;

/// Transition table. Built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    entries: HashMap<(Stage, Action), Stage>,
}

impl TransitionTable {
    /// The intake flow table.
    ///
    /// `back` from the summary stage loops to itself. There is no real way
    /// back from a summary that has already been logged.
    pub fn intake() -> Self {
        Self::from_entries([
            ((Stage::Start, Action::Next), Stage::WaitingForQuestion),
            ((Stage::WaitingForQuestion, Action::Next), Stage::WaitingForSummary),
            ((Stage::WaitingForQuestion, Action::Back), Stage::Start),
            ((Stage::WaitingForSummary, Action::Next), Stage::Finished),
            ((Stage::WaitingForSummary, Action::Back), Stage::WaitingForSummary),
            ((Stage::WaitingForSummary, Action::Cancel), Stage::Start),
        ])
    }

    pub fn from_entries(entries: impl IntoIterator<Item = ((Stage, Action), Stage)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Pure lookup. `None` means there is no such transition.
    pub fn next_stage(&self, current: Stage, action: Action) -> Option<Stage> {
        self.entries.get(&(current, action)).copied()
    }

    /// Actions with an outgoing edge from `stage`, in declaration order
    pub fn actions_from(&self, stage: Stage) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|action| self.entries.contains_key(&(stage, *action)))
            .collect()
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::intake()
    }
}
