//! Per-user conversation value

use super::Stage;
use std::collections::BTreeMap;

/// Open-ended record of collected values
pub type Fields = BTreeMap<String, String>;

/// Well-known field keys
pub mod field {
    pub const QUERY: &str = "query";
    pub const USER_ID: &str = "user_id";
    pub const USER_NAME: &str = "user_name";
    /// Display-formatted submission time
    pub const DATE: &str = "date";
    pub const ID_QUERY: &str = "id_query";
    /// Storage-formatted submission time
    pub const DATE_FOR_SHEET: &str = "date_for_sheet";
}

/// Current stage plus collected fields for one user.
///
/// `stage == None` means there is no active conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    stage: Option<Stage>,
    fields: Fields,
}

impl Conversation {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// A conversation already sitting in `stage`
    #[cfg(test)]
    pub fn at(stage: Stage) -> Self {
        Self {
            stage: Some(stage),
            fields: Fields::new(),
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn set_stage(&mut self, stage: Stage) {
        self.stage = Some(stage);
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Merge `partial` into the fields. Existing keys are overwritten.
    pub fn update_fields<K, V>(&mut self, partial: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.fields
            .extend(partial.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Reset stage to none and drop all fields
    pub fn clear(&mut self) {
        self.stage = None;
        self.fields.clear();
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.stage.is_some()
    }

    /// True when there is nothing worth keeping in a store
    pub fn is_empty(&self) -> bool {
        self.stage.is_none() && self.fields.is_empty()
    }
}
