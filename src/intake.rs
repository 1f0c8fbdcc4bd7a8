//! Question capture and the submission record handed to external sinks

use crate::state_machine::{field, Fields, UserId};
use crate::texts::escape_html;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;

/// Storage timestamp format (spreadsheet column)
pub const SHEET_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Timestamp format shown to users
pub const DISPLAY_DATE_FORMAT: &str = "%d.%m.%Y %H:%M";
const ID_DATE_FORMAT: &str = "%y%m%d%H%M%S";

/// Spreadsheet columns a record fills, in the order the sheet expects them
pub const SHEET_HEADERS: [&str; 5] = ["date", "user_id", "user_name", "query", "id_query"];

/// Why a message could not be taken as a question
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidQuestion {
    #[error("Message has no text")]
    NoText,
    #[error("Message is empty")]
    Empty,
    #[error("Message looks like a command")]
    Command,
}

/// Validate a raw message as question text, returning it trimmed
pub fn capture_question(raw: Option<&str>) -> Result<&str, InvalidQuestion> {
    let text = raw.ok_or(InvalidQuestion::NoText)?;
    if text.starts_with('/') {
        return Err(InvalidQuestion::Command);
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(InvalidQuestion::Empty);
    }
    Ok(trimmed)
}

/// Write-once snapshot of a submitted question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionRecord {
    /// Storage-formatted timestamp
    pub date: String,
    pub user_id: String,
    pub user_name: String,
    pub query: String,
    pub id_query: String,
    /// Display-formatted timestamp
    #[serde(skip)]
    pub display_date: String,
}

impl SubmissionRecord {
    pub fn new<Z>(user_id: UserId, user_name: &str, query: &str, at: &DateTime<Z>) -> Self
    where
        Z: TimeZone,
        Z::Offset: std::fmt::Display,
    {
        Self {
            date: at.format(SHEET_DATE_FORMAT).to_string(),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            query: query.to_string(),
            id_query: format!("q_{user_id}_{}", at.format(ID_DATE_FORMAT)),
            display_date: at.format(DISPLAY_DATE_FORMAT).to_string(),
        }
    }

    /// Stamp a record with the current local time in `timezone`
    pub fn now(user_id: UserId, user_name: &str, query: &str, timezone: Tz) -> Self {
        Self::new(user_id, user_name, query, &Utc::now().with_timezone(&timezone))
    }

    /// Fields merged into the conversation before the summary is shown
    pub fn conversation_fields(&self) -> Fields {
        Fields::from([
            (field::QUERY.to_string(), self.query.clone()),
            (field::USER_ID.to_string(), self.user_id.clone()),
            (field::USER_NAME.to_string(), self.user_name.clone()),
            (field::DATE.to_string(), self.display_date.clone()),
            (field::ID_QUERY.to_string(), self.id_query.clone()),
            (field::DATE_FOR_SHEET.to_string(), self.date.clone()),
        ])
    }

    /// Value for a spreadsheet column; unknown columns are left blank
    pub fn column(&self, header: &str) -> &str {
        match header {
            "date" => &self.date,
            "user_id" => &self.user_id,
            "user_name" => &self.user_name,
            "query" => &self.query,
            "id_query" => &self.id_query,
            _ => "",
        }
    }

    /// One spreadsheet row ordered by `headers`
    pub fn row_for(&self, headers: &[String]) -> Vec<String> {
        headers
            .iter()
            .map(|header| self.column(header).to_string())
            .collect()
    }

    /// HTML notification for the support chat
    pub fn render_notification(&self) -> String {
        format!(
            "<b>❗️ New request!</b>\n\n\
             🆔 <b>Request ID:</b> {}\n\
             👤 <b>User:</b> {} (ID: {})\n\
             📅 <b>Time:</b> {}\n\n\
             📝 <b>Question:</b>\n{}\n",
            escape_html(&self.id_query),
            escape_html(&self.user_name),
            escape_html(&self.user_id),
            escape_html(&self.date),
            escape_html(&self.query),
        )
    }
}
