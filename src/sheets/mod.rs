//! Spreadsheet access.
//!
//! The knowledge base is a spreadsheet with one sheet per tab. This module
//! exposes the pull-only [`SheetSource`] seam and its Google Sheets
//! implementation.

mod google;
mod source;

pub use google::{GoogleSheetsClient, SpreadsheetInfo};
pub use source::{SheetSource, SheetsError, rows_to_records};
