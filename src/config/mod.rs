//! Configuration module for the student bot.
//!
//! Handles loading and validation of the environment-provided settings
//! and the spreadsheet service-account credentials.

mod credentials;
mod settings;

pub use credentials::{CredentialsError, ServiceAccountKey};
pub use settings::{BotConfig, ConfigError, ReminderSettings, SheetsConfig, WebhookConfig};
