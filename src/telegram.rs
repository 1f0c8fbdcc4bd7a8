//! Telegram Bot API transport
//!
//! Thin JSON client over the HTTP Bot API: long polling for updates and
//! the handful of methods the intake flow needs.

mod client;
mod error;
pub mod keyboard;
pub mod types;

pub use client::TelegramClient;
pub use error::{TelegramError, TelegramErrorKind};
pub use keyboard::create_inline_keyboard;
pub use types::*;
