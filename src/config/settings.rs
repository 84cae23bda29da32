//! Application settings loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

use super::credentials::{CredentialsError, ServiceAccountKey};

/// Everything the bot needs to start, read once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot access token.
    pub telegram_token: String,

    /// Spreadsheet and its service-account credentials.
    pub sheets: SheetsConfig,

    /// External Q&A webhook.
    pub webhook: WebhookConfig,

    /// Telegram user ids allowed to use privileged commands.
    pub admin_user_ids: Vec<u64>,

    /// How often the knowledge cache is re-read from the spreadsheet.
    pub cache_refresh_interval: Duration,

    /// Reminder scheduler settings.
    pub reminders: ReminderSettings,

    /// Where the subscriber registry is persisted.
    pub subscribers_path: PathBuf,
}

/// Spreadsheet access configuration.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    /// Spreadsheet identifier (the long id in the sheet URL).
    pub spreadsheet_id: String,

    /// Service-account key used to sign access-token requests.
    pub credentials: ServiceAccountKey,

    /// Upper bound for any single Sheets or token request.
    pub request_timeout: Duration,
}

/// Q&A webhook configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub key: String,
    /// Bounded wait for a single answer.
    pub timeout: Duration,
}

/// Reminder scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderSettings {
    /// Interval between scheduler ticks.
    pub check_interval: Duration,

    /// Local hour of day from which the day's reminders go out.
    pub send_from_hour: u32,

    /// Items dated within this many days from today qualify.
    pub lookahead_days: u32,
}

fn default_cache_refresh_secs() -> u64 {
    300 // 5 minutes, same cadence the sheet cache always had
}

fn default_sheets_timeout_secs() -> u64 {
    20
}

fn default_qa_timeout_secs() -> u64 {
    30
}

fn default_subscribers_path() -> PathBuf {
    PathBuf::from("subscribers.json")
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(3600),
            send_from_hour: 9,
            lookahead_days: 7,
        }
    }
}

impl BotConfig {
    /// Creates configuration from environment variables.
    ///
    /// Required: `TELEGRAM_BOT_TOKEN`, `GOOGLE_SHEETS_ID`, one of
    /// `GOOGLE_CREDENTIALS_FILE` / `GOOGLE_CREDENTIALS_JSON`,
    /// `QA_WEBHOOK_URL` and `QA_WEBHOOK_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingEnvVar(name))
        };

        let telegram_token = required("TELEGRAM_BOT_TOKEN")?;
        let sheets = SheetsConfig::from_lookup(&lookup)?;
        let url = required("QA_WEBHOOK_URL")?;
        let key = required("QA_WEBHOOK_KEY")?;

        let admin_user_ids = match lookup("ADMIN_USER_IDS") {
            Some(raw) => parse_admin_ids(&raw)?,
            None => Vec::new(),
        };

        let cache_refresh_secs =
            parse_number(&lookup, "CACHE_REFRESH_SECS")?.unwrap_or_else(default_cache_refresh_secs);
        let qa_timeout_secs =
            parse_number(&lookup, "QA_TIMEOUT_SECS")?.unwrap_or_else(default_qa_timeout_secs);

        let defaults = ReminderSettings::default();
        let reminders = ReminderSettings {
            check_interval: parse_number(&lookup, "REMINDER_CHECK_SECS")?
                .map_or(defaults.check_interval, Duration::from_secs),
            send_from_hour: parse_number(&lookup, "REMINDER_HOUR")?
                .unwrap_or(defaults.send_from_hour),
            lookahead_days: parse_number(&lookup, "REMINDER_LOOKAHEAD_DAYS")?
                .unwrap_or(defaults.lookahead_days),
        };
        if reminders.send_from_hour > 23 {
            return Err(ConfigError::InvalidNumber("REMINDER_HOUR"));
        }
        if cache_refresh_secs == 0 || qa_timeout_secs == 0 || reminders.check_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }

        let subscribers_path = lookup("SUBSCRIBERS_PATH")
            .filter(|p| !p.trim().is_empty())
            .map_or_else(default_subscribers_path, PathBuf::from);

        Ok(Self {
            telegram_token,
            sheets,
            webhook: WebhookConfig {
                url,
                key,
                timeout: Duration::from_secs(qa_timeout_secs),
            },
            admin_user_ids,
            cache_refresh_interval: Duration::from_secs(cache_refresh_secs),
            reminders,
            subscribers_path,
        })
    }
}

impl SheetsConfig {
    /// Reads only the spreadsheet settings, for tools that need nothing else.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let spreadsheet_id = lookup("GOOGLE_SHEETS_ID")
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingEnvVar("GOOGLE_SHEETS_ID"))?;
        let credentials = load_credentials(&lookup)?;
        let timeout_secs =
            parse_number(&lookup, "SHEETS_TIMEOUT_SECS")?.unwrap_or_else(default_sheets_timeout_secs);
        if timeout_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(Self {
            spreadsheet_id,
            credentials,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn load_credentials<F>(lookup: &F) -> Result<ServiceAccountKey, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(json) = lookup("GOOGLE_CREDENTIALS_JSON").filter(|v| !v.trim().is_empty()) {
        return Ok(ServiceAccountKey::from_json(&json)?);
    }
    match lookup("GOOGLE_CREDENTIALS_FILE").filter(|v| !v.trim().is_empty()) {
        Some(path) => Ok(ServiceAccountKey::load_from_file(path.trim())?),
        None => Err(ConfigError::MissingEnvVar("GOOGLE_CREDENTIALS_FILE")),
    }
}

fn parse_number<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name).map(|v| v.trim().to_owned()) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber(name)),
    }
}

fn parse_admin_ids(raw: &str) -> Result<Vec<u64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| ConfigError::InvalidAdminId(s.to_owned()))
        })
        .collect()
}

/// Configuration errors. Any of these stops the process at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Environment variable {0} must be a non-negative integer in range")]
    InvalidNumber(&'static str),

    #[error("Invalid entry in ADMIN_USER_IDS: '{0}'")]
    InvalidAdminId(String),

    #[error("Refresh, timeout and reminder intervals must be greater than zero")]
    ZeroInterval,

    #[error(transparent)]
    Credentials(#[from] CredentialsError),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::credentials::tests::SAMPLE_KEY_JSON;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("TELEGRAM_BOT_TOKEN", "123:abc".to_owned()),
            ("GOOGLE_SHEETS_ID", "sheet-id".to_owned()),
            ("GOOGLE_CREDENTIALS_JSON", SAMPLE_KEY_JSON.to_owned()),
            ("QA_WEBHOOK_URL", "https://hooks.example.com/qa".to_owned()),
            ("QA_WEBHOOK_KEY", "secret".to_owned()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<BotConfig, ConfigError> {
        BotConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn test_defaults_applied() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.cache_refresh_interval, Duration::from_secs(300));
        assert_eq!(config.webhook.timeout, Duration::from_secs(30));
        assert_eq!(config.sheets.request_timeout, Duration::from_secs(20));
        assert_eq!(config.reminders, ReminderSettings::default());
        assert_eq!(config.subscribers_path, PathBuf::from("subscribers.json"));
        assert!(config.admin_user_ids.is_empty());
    }

    #[test]
    fn test_missing_required_value_is_fatal() {
        for name in [
            "TELEGRAM_BOT_TOKEN",
            "GOOGLE_SHEETS_ID",
            "QA_WEBHOOK_URL",
            "QA_WEBHOOK_KEY",
        ] {
            let mut env = base_env();
            env.remove(name);
            match load(&env) {
                Err(ConfigError::MissingEnvVar(missing)) => assert_eq!(missing, name),
                other => panic!("expected missing {name}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut env = base_env();
        env.insert("QA_WEBHOOK_KEY", "   ".to_owned());
        assert!(matches!(
            load(&env),
            Err(ConfigError::MissingEnvVar("QA_WEBHOOK_KEY"))
        ));
    }

    #[test]
    fn test_missing_credentials() {
        let mut env = base_env();
        env.remove("GOOGLE_CREDENTIALS_JSON");
        assert!(matches!(
            load(&env),
            Err(ConfigError::MissingEnvVar("GOOGLE_CREDENTIALS_FILE"))
        ));
    }

    #[test]
    fn test_admin_ids_parsed() {
        let mut env = base_env();
        env.insert("ADMIN_USER_IDS", " 11, 22 ,,33".to_owned());
        let config = load(&env).unwrap();
        assert_eq!(config.admin_user_ids, vec![11, 22, 33]);

        env.insert("ADMIN_USER_IDS", "11,abc".to_owned());
        assert!(matches!(load(&env), Err(ConfigError::InvalidAdminId(id)) if id == "abc"));
    }

    #[test]
    fn test_numeric_overrides() {
        let mut env = base_env();
        env.insert("CACHE_REFRESH_SECS", "60".to_owned());
        env.insert("QA_TIMEOUT_SECS", "5".to_owned());
        env.insert("SHEETS_TIMEOUT_SECS", "8".to_owned());
        env.insert("REMINDER_HOUR", "7".to_owned());
        env.insert("REMINDER_LOOKAHEAD_DAYS", "3".to_owned());
        let config = load(&env).unwrap();
        assert_eq!(config.cache_refresh_interval, Duration::from_secs(60));
        assert_eq!(config.webhook.timeout, Duration::from_secs(5));
        assert_eq!(config.sheets.request_timeout, Duration::from_secs(8));
        assert_eq!(config.reminders.send_from_hour, 7);
        assert_eq!(config.reminders.lookahead_days, 3);
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let mut env = base_env();
        env.insert("QA_TIMEOUT_SECS", "soon".to_owned());
        assert!(matches!(
            load(&env),
            Err(ConfigError::InvalidNumber("QA_TIMEOUT_SECS"))
        ));

        let mut env = base_env();
        env.insert("REMINDER_HOUR", "24".to_owned());
        assert!(matches!(
            load(&env),
            Err(ConfigError::InvalidNumber("REMINDER_HOUR"))
        ));

        let mut env = base_env();
        env.insert("CACHE_REFRESH_SECS", "0".to_owned());
        assert!(matches!(load(&env), Err(ConfigError::ZeroInterval)));

        let mut env = base_env();
        env.insert("SHEETS_TIMEOUT_SECS", "0".to_owned());
        assert!(matches!(load(&env), Err(ConfigError::ZeroInterval)));
    }
}
