//! Effects produced by stage handlers

/// Side effects the runtime performs after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send HTML-formatted text to the user's chat
    Reply { text: String },
}

impl Effect {
    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply { text: text.into() }
    }

    /// Text of a reply effect
    #[cfg(test)]
    pub fn text(&self) -> &str {
        match self {
            Effect::Reply { text } => text,
        }
    }
}
