//! Google Sheets submission log
//!
//! Appends one row per submission. Column order comes from the sheet's own
//! header row, so extra columns in the sheet are tolerated and left blank.

use crate::config::{ServiceAccountKey, SheetsConfig};
use crate::intake::{SubmissionRecord, SHEET_HEADERS};
use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const HEADER_ATTEMPTS: u32 = 3;
const HEADER_RETRY_BASE: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Google auth error: {0}")]
    Auth(#[from] gcp_auth::Error),
    #[error("Sheets API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Invalid Sheets URL: {0}")]
    Url(String),
    #[error("Worksheet header row is missing columns: {}", .0.join(", "))]
    MissingHeaders(Vec<String>),
    #[error("Could not read worksheet header row after {0} attempts")]
    HeadersUnavailable(u32),
}

impl SheetsError {
    fn is_rate_limit(&self) -> bool {
        matches!(self, SheetsError::Api { status: 429, .. })
    }
}

/// Source of OAuth bearer tokens for the Sheets API
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    /// A currently valid token. Implementations refresh as needed.
    async fn access_token(&self) -> Result<String, SheetsError>;
}

/// Tokens minted from a service-account key, cached until they expire
pub struct ServiceAccountTokens {
    account: CustomServiceAccount,
}

impl ServiceAccountTokens {
    pub fn new(key: &ServiceAccountKey) -> Result<Self, SheetsError> {
        Ok(Self {
            account: CustomServiceAccount::from_json(key.json())?,
        })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokens {
    async fn access_token(&self) -> Result<String, SheetsError> {
        let token = self.account.token(&[SPREADSHEETS_SCOPE]).await?;
        Ok(token.as_str().to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct AppendBody<'a> {
    values: [&'a [String]; 1],
}

/// Client for one worksheet of one spreadsheet
pub struct SheetsLog {
    client: Client,
    config: SheetsConfig,
    tokens: Arc<dyn AccessTokenSource>,
    /// First header retry delay; doubles per attempt
    retry_base: Duration,
}

impl SheetsLog {
    /// Log authenticated with the configured service account
    pub fn new(config: SheetsConfig) -> Result<Self, SheetsError> {
        let tokens = Arc::new(ServiceAccountTokens::new(&config.service_account)?);
        Self::with_tokens(config, tokens)
    }

    pub fn with_tokens(
        config: SheetsConfig,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Result<Self, SheetsError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            config,
            tokens,
            retry_base: HEADER_RETRY_BASE,
        })
    }

    pub fn worksheet(&self) -> &str {
        &self.config.worksheet
    }

    /// `{api}/v4/spreadsheets/{id}/values/{range}{suffix}`
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&self.config.api_url)
            .map_err(|e| SheetsError::Url(format!("{}: {e}", self.config.api_url)))?;
        url.path_segments_mut()
            .map_err(|()| SheetsError::Url(self.config.api_url.clone()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                &self.config.spreadsheet_id,
                "values",
                &format!("{range}{suffix}"),
            ]);
        Ok(url)
    }

    fn quoted_sheet(&self) -> String {
        format!("'{}'", self.config.worksheet.replace('\'', "''"))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SheetsError::Api {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn read_headers(&self) -> Result<Vec<String>, SheetsError> {
        let url = self.values_url(&format!("{}!1:1", self.quoted_sheet()), "")?;
        let token = self.tokens.access_token().await?;
        let response = self.client.get(url).bearer_auth(token).send().await?;
        let range: ValueRange = Self::check(response).await?.json().await?;
        Ok(range.values.into_iter().next().unwrap_or_default())
    }

    /// Read the header row, retrying with exponential backoff (1s, 2s, ...)
    async fn headers_with_retry(&self) -> Result<Vec<String>, SheetsError> {
        for attempt in 1..=HEADER_ATTEMPTS {
            match self.read_headers().await {
                Ok(headers) if headers.is_empty() => {
                    tracing::warn!(attempt, worksheet = %self.worksheet(), "Header row is empty");
                }
                Ok(headers) => {
                    let missing = missing_headers(&headers);
                    if missing.is_empty() {
                        tracing::debug!(?headers, "Read worksheet headers");
                        return Ok(headers);
                    }
                    tracing::warn!(attempt, ?missing, found = ?headers, "Header row is incomplete");
                    if attempt == HEADER_ATTEMPTS {
                        return Err(SheetsError::MissingHeaders(missing));
                    }
                }
                Err(e) if e.is_rate_limit() => {
                    tracing::warn!(attempt, "Sheets API rate limited while reading headers");
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Failed to read worksheet headers");
                }
            }

            if attempt < HEADER_ATTEMPTS {
                let delay = self.retry_base * (1 << (attempt - 1));
                tracing::info!(?delay, "Retrying header read");
                tokio::time::sleep(delay).await;
            }
        }

        Err(SheetsError::HeadersUnavailable(HEADER_ATTEMPTS))
    }

    /// Append `record` as a new row at the end of the worksheet
    pub async fn append(&self, record: &SubmissionRecord) -> Result<(), SheetsError> {
        let headers = self.headers_with_retry().await?;
        let row = record.row_for(&headers);
        tracing::debug!(?row, worksheet = %self.worksheet(), "Prepared row");

        let mut url = self.values_url(&format!("{}!A1", self.quoted_sheet()), ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&AppendBody { values: [&row] })
            .send()
            .await?;
        Self::check(response).await?;

        tracing::info!(
            user_id = %record.user_id,
            user_name = %record.user_name,
            worksheet = %self.worksheet(),
            "Submission appended to sheet"
        );
        Ok(())
    }
}

/// Expected columns absent from `headers`
pub fn missing_headers(headers: &[String]) -> Vec<String> {
    SHEET_HEADERS
        .iter()
        .filter(|expected| !headers.iter().any(|h| h == *expected))
        .map(|h| (*h).to_string())
        .collect()
}
