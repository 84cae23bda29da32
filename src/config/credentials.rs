//! Google service-account credential loading.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading service-account credentials.
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Failed to read credentials file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse credentials JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Credentials are of type '{0}', expected 'service_account'")]
    WrongType(String),

    #[error("Credentials field '{0}' is empty")]
    EmptyField(&'static str),
}

/// The subset of a downloaded service-account key the bot uses.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default = "default_key_type")]
    pub key_type: String,

    /// Account e-mail, used as the JWT issuer.
    pub client_email: String,

    /// PEM-encoded RSA private key.
    pub private_key: String,

    #[serde(default)]
    pub private_key_id: Option<String>,

    /// OAuth2 token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_key_type() -> String {
    "service_account".to_owned()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_owned()
}

impl ServiceAccountKey {
    /// Loads a key from a JSON file downloaded from the cloud console.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses and validates a key from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, CredentialsError> {
        let key: Self = serde_json::from_str(json)?;
        key.validate()?;
        Ok(key)
    }

    fn validate(&self) -> Result<(), CredentialsError> {
        if self.key_type != "service_account" {
            return Err(CredentialsError::WrongType(self.key_type.clone()));
        }
        if self.client_email.trim().is_empty() {
            return Err(CredentialsError::EmptyField("client_email"));
        }
        if self.private_key.trim().is_empty() {
            return Err(CredentialsError::EmptyField("private_key"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}
