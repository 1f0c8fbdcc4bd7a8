//! Conversation stages and the actions that move between them

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A named point in the intake dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Synthetic predecessor of the first real stage. Set when the user
    /// presses the start button; never waits for input itself.
    Start,
    /// Prompt sent, waiting for the user to type a question
    WaitingForQuestion,
    /// Summary shown; advances on its own
    WaitingForSummary,
    /// Terminal. Entering it clears the conversation.
    Finished,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Start,
        Stage::WaitingForQuestion,
        Stage::WaitingForSummary,
        Stage::Finished,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::WaitingForQuestion => "waiting_for_question",
            Stage::WaitingForSummary => "waiting_for_summary",
            Stage::Finished => "finished",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Finished)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown stage: {0}")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Stage::Start),
            "waiting_for_question" => Ok(Stage::WaitingForQuestion),
            "waiting_for_summary" => Ok(Stage::WaitingForSummary),
            // Both spellings have been seen in stored tables
            "finished" | "finish" => Ok(Stage::Finished),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

/// A trigger requesting a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Next,
    Back,
    Cancel,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Next, Action::Back, Action::Cancel];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Next => "next",
            Action::Back => "back",
            Action::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "next" => Ok(Action::Next),
            "back" => Ok(Action::Back),
            "cancel" => Ok(Action::Cancel),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_round_trips_through_str() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
    }

    #[test]
    fn test_finish_alias() {
        assert_eq!("finish".parse::<Stage>().unwrap(), Stage::Finished);
        assert_eq!(Stage::Finished.to_string(), "finished");
    }

    #[test]
    fn test_unknown_values_rejected() {
        assert_eq!(
            "stale_stage".parse::<Stage>(),
            Err(UnknownStage("stale_stage".to_string()))
        );
        assert!("skip".parse::<Action>().is_err());
        assert_eq!("back".parse::<Action>().unwrap(), Action::Back);
    }

    #[test]
    fn test_only_finished_is_terminal() {
        let terminal: Vec<_> = Stage::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![Stage::Finished]);
    }
}
