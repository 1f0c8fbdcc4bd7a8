//! Inline keyboard construction

use super::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Telegram's limit on `callback_data`, in bytes
const MAX_CALLBACK_DATA_BYTES: usize = 64;

/// Replace spaces with underscores and cut to 64 bytes on a char boundary
pub fn sanitize_callback_data(data: &str) -> String {
    let replaced = data.replace(' ', "_");
    let mut out = String::with_capacity(MAX_CALLBACK_DATA_BYTES);
    for c in replaced.chars() {
        if out.len() + c.len_utf8() > MAX_CALLBACK_DATA_BYTES {
            break;
        }
        out.push(c);
    }
    out
}

fn to_button((text, data): (&str, &str)) -> InlineKeyboardButton {
    InlineKeyboardButton {
        text: text.to_string(),
        callback_data: sanitize_callback_data(data),
    }
}

/// Lay out `(text, callback_data)` pairs in rows of `row_width`
pub fn create_inline_keyboard<'a>(
    buttons: impl IntoIterator<Item = (&'a str, &'a str)>,
    row_width: usize,
) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = buttons.into_iter().map(to_button).collect();
    InlineKeyboardMarkup {
        inline_keyboard: buttons
            .chunks(row_width.max(1))
            .map(<[InlineKeyboardButton]>::to_vec)
            .collect(),
    }
}
