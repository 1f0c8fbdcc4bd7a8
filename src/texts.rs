//! User-facing message text and HTML helpers
//!
//! All outbound text uses Telegram's HTML parse mode, so anything typed by
//! a user must go through [`escape_html`] before being interpolated.

/// Telegram's per-message character limit
pub const MAX_MESSAGE_CHARS: usize = 4096;

pub const START_BUTTON_TEXT: &str = "🛟 Write a request";
pub const START_QUERY_CALLBACK: &str = "start_query";
pub const START_COMMAND_DESCRIPTION: &str = "🏁 Get started and write a request";

pub const FEEDBACK_TEXT: &str = "<b>📝 New support request</b>";
pub const QUESTION_PROMPT: &str = "🙋 Write your question or describe the problem";
pub const REENTER_AS_TEXT: &str = "Please enter your question as text.";
pub const THANKS_TEXT: &str = "🙏 Thank you for contacting our support service";

pub const UNKNOWN_USER: &str = "Unknown user";
pub const NOT_AVAILABLE: &str = "N/A";
pub const QUERY_NOT_SAVED: &str = "Question text was not saved";
pub const DATE_NOT_SAVED: &str = "Date was not saved";

pub fn welcome(first_name: &str) -> String {
    format!(
        "👋 Hello, <b>{}</b>!\n\n\
         This is the support bot. Press the button below to send us a question \
         or describe a problem.",
        escape_html(first_name)
    )
}

/// Escape the three characters Telegram's HTML mode treats specially
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

/// Split text into chunks of at most [`MAX_MESSAGE_CHARS`] characters.
///
/// Empty input yields no chunks.
pub fn split_message(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(MAX_MESSAGE_CHARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
