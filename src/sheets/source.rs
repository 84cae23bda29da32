//! Pull-only source of tab rows.

use async_trait::async_trait;
use thiserror::Error;

use crate::knowledge::{Record, Tab};

/// Errors that can occur while fetching a tab.
#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("Failed to sign access token request: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets API returned {status} for '{sheet}': {body}")]
    Api {
        sheet: String,
        status: u16,
        body: String,
    },

    #[error("Sheet '{0}' has no header row")]
    MissingHeader(String),
}

/// Something that can return the current rows of a tab.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Fetches every data row of `tab`, in sheet order.
    async fn fetch_tab(&self, tab: Tab) -> Result<Vec<Record>, SheetsError>;
}

/// Converts a raw value grid (header row first) into records.
///
/// Short rows are padded with empty strings; cells beyond the header
/// width are dropped. Rows that are entirely blank are skipped.
pub fn rows_to_records(sheet: &str, values: Vec<Vec<String>>) -> Result<Vec<Record>, SheetsError> {
    let mut rows = values.into_iter();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| SheetsError::MissingHeader(sheet.to_owned()))?
        .into_iter()
        .map(|h| h.trim().to_owned())
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(SheetsError::MissingHeader(sheet.to_owned()));
    }

    let records = rows
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|row| {
            let mut cells = row.into_iter();
            headers
                .iter()
                .map(|header| {
                    let cell = cells.next().unwrap_or_default();
                    (header.clone(), cell.trim().to_owned())
                })
                .filter(|(header, _)| !header.is_empty())
                .collect::<Record>()
        })
        .collect();

    Ok(records)
}
