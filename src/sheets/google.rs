//! Google Sheets API client authenticated with a service account.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::source::{SheetSource, SheetsError, rows_to_records};
use crate::config::{ServiceAccountKey, SheetsConfig};
use crate::knowledge::{Record, Tab};

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

/// Tokens are refreshed this long before Google says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime requested for signed assertions (Google's maximum).
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    properties: Option<SheetProperties>,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    #[serde(default)]
    title: String,
}

/// Title of a spreadsheet and of every sheet in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetInfo {
    pub title: String,
    pub sheet_titles: Vec<String>,
}

#[derive(Debug)]
struct AccessToken {
    value: String,
    refresh_after: Instant,
}

/// Read-only Sheets API client.
pub struct GoogleSheetsClient {
    http: reqwest::Client,
    spreadsheet_id: String,
    key: ServiceAccountKey,
    api_base: String,
    token: Mutex<Option<AccessToken>>,
}

impl GoogleSheetsClient {
    /// Creates a client for the configured spreadsheet.
    ///
    /// Every request, token exchange included, is bounded by
    /// `config.request_timeout`; a stalled one fails with [`SheetsError::Http`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SheetsConfig) -> Result<Self, SheetsError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            spreadsheet_id: config.spreadsheet_id.clone(),
            key: config.credentials.clone(),
            api_base: DEFAULT_API_BASE.to_owned(),
            token: Mutex::new(None),
        })
    }

    /// Points the client at a different API host.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    /// Fetches the raw `A:Z` grid of a sheet.
    pub async fn fetch_values(&self, sheet: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{sheet}!A:Z",
            self.api_base, self.spreadsheet_id
        );

        let response = self.http.get(&url).bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetsError::Api {
                sheet: sheet.to_owned(),
                status: status.as_u16(),
                body,
            });
        }

        let range: ValueRange = response.json().await?;
        debug!("Fetched {} raw rows from {}", range.values.len(), sheet);

        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    /// Reads the spreadsheet title and its sheet titles.
    pub async fn spreadsheet_info(&self) -> Result<SpreadsheetInfo, SheetsError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/v4/spreadsheets/{}?fields=properties.title,sheets.properties.title",
            self.api_base, self.spreadsheet_id
        );

        let response = self.http.get(&url).bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetsError::Api {
                sheet: String::new(),
                status: status.as_u16(),
                body,
            });
        }

        let meta: SpreadsheetMeta = response.json().await?;
        Ok(SpreadsheetInfo {
            title: meta.properties.map(|p| p.title).unwrap_or_default(),
            sheet_titles: meta.sheets.into_iter().map(|s| s.properties.title).collect(),
        })
    }

    /// Returns a cached access token, exchanging a fresh signed assertion when needed.
    async fn access_token(&self) -> Result<String, SheetsError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_after
        {
            return Ok(token.value.clone());
        }

        let assertion = self.sign_assertion()?;
        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetsError::Auth(format!("{status}: {body}")));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        info!("Obtained Sheets access token for {}", self.key.client_email);

        *cached = Some(AccessToken {
            value: token.access_token.clone(),
            refresh_after: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    fn sign_assertion(&self) -> Result<String, SheetsError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid.clone_from(&self.key.private_key_id);

        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(&header, &claims, &key)?)
    }
}

#[async_trait]
impl SheetSource for GoogleSheetsClient {
    async fn fetch_tab(&self, tab: Tab) -> Result<Vec<Record>, SheetsError> {
        let values = self.fetch_values(tab.sheet_name()).await?;
        rows_to_records(tab.sheet_name(), values)
    }
}

impl std::fmt::Debug for GoogleSheetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSheetsClient")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
