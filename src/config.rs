//! Bot configuration from environment variables

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono_tz::Tz;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com";
const DEFAULT_WORKSHEET: &str = "SupportLog";
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Google service-account key file contents (JSON)
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceAccountKey(String);

impl ServiceAccountKey {
    pub fn new(json: impl Into<String>) -> Self {
        Self(json.into())
    }

    pub fn json(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServiceAccountKey(<redacted>)")
    }
}

/// Google Sheets submission log settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsConfig {
    pub api_url: String,
    pub spreadsheet_id: String,
    pub worksheet: String,
    pub service_account: ServiceAccountKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub telegram_token: String,
    pub telegram_api_url: String,
    /// Chat that receives new-request notifications
    pub support_chat_id: Option<i64>,
    /// Zone used for submission timestamps
    pub timezone: Tz,
    /// Long-poll timeout passed to `getUpdates`
    pub poll_timeout: Duration,
    /// `None` disables the spreadsheet log
    pub sheets: Option<SheetsConfig>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let telegram_token = get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let support_chat_id = get("SUPPORT_CHAT_ID")
            .map(|raw| {
                raw.trim().parse::<i64>().map_err(|e| ConfigError::Invalid {
                    name: "SUPPORT_CHAT_ID",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let timezone = match get("TIMEZONE") {
            Some(raw) => raw.trim().parse::<Tz>().map_err(|e| ConfigError::Invalid {
                name: "TIMEZONE",
                reason: format!("expected an IANA zone name such as Europe/Moscow: {e}"),
            })?,
            None => Tz::UTC,
        };

        let poll_timeout = match get("POLL_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse().map_err(
                |e: std::num::ParseIntError| ConfigError::Invalid {
                    name: "POLL_TIMEOUT_SECS",
                    reason: e.to_string(),
                },
            )?),
            None => Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS),
        };

        // Inline base64 wins over a key file path
        let service_account = match (get("GOOGLE_CREDENTIALS_B64"), get("GOOGLE_CREDENTIALS_PATH")) {
            (Some(encoded), _) => Some(decode_key(&encoded)?),
            (None, Some(path)) => Some(read_key(&path)?),
            (None, None) => None,
        };

        let sheets = match (get("GOOGLE_SHEET_ID"), service_account) {
            (Some(spreadsheet_id), Some(service_account)) => Some(SheetsConfig {
                api_url: get("GOOGLE_SHEETS_API_URL")
                    .unwrap_or_else(|| DEFAULT_SHEETS_API_URL.to_string()),
                spreadsheet_id,
                worksheet: get("SUPPORT_LOG_WORKSHEET_NAME")
                    .unwrap_or_else(|| DEFAULT_WORKSHEET.to_string()),
                service_account,
            }),
            (Some(_), None) => {
                tracing::warn!(
                    "GOOGLE_SHEET_ID is set without GOOGLE_CREDENTIALS_B64 or GOOGLE_CREDENTIALS_PATH"
                );
                None
            }
            (None, Some(_)) => {
                tracing::warn!("Google credentials are set without GOOGLE_SHEET_ID");
                None
            }
            (None, None) => None,
        };

        Ok(Self {
            telegram_token,
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            support_chat_id,
            timezone,
            poll_timeout,
            sheets,
        })
    }
}

fn decode_key(encoded: &str) -> Result<ServiceAccountKey, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        name: "GOOGLE_CREDENTIALS_B64",
        reason,
    };
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| invalid(e.to_string()))?;
    let json = String::from_utf8(bytes).map_err(|e| invalid(e.to_string()))?;
    Ok(ServiceAccountKey::new(json))
}

fn read_key(path: &str) -> Result<ServiceAccountKey, ConfigError> {
    std::fs::read_to_string(path)
        .map(ServiceAccountKey::new)
        .map_err(|e| ConfigError::Invalid {
            name: "GOOGLE_CREDENTIALS_PATH",
            reason: format!("{path}: {e}"),
        })
}
