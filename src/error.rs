//! Crate-level error type
//!
//! Each module owns its own error enum; [`HubError`] gathers them for the
//! binary and for embedders that want a single `Result` type. Messages shown
//! to a user go through [`HubError::user_message`], which redacts anything
//! that looks like a credential.

use crate::config::ConfigError;
use crate::directory::DirectoryError;
use crate::manager::ManagerError;
use crate::tls::IdentityError;
use crate::transport::{ConnectError, PublishError};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

const MAX_MESSAGE_LEN: usize = 500;
const TRUNCATE_SUFFIX: &str = "...[truncated]";

static SECRET_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").ok());

static SENSITIVE_PATH_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|certs?|private)/[a-zA-Z0-9._/-]+").ok()
});

/// Main error type for sensor hub client operations
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection error: {0}")]
    Connect(#[from] ConnectError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("TLS identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Connection manager error: {0}")]
    Manager(#[from] ManagerError),

    #[error("Device directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl HubError {
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Display text safe to print or log
    pub fn user_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            HubError::Config(_) | HubError::InvalidInput { .. } => 2,
            _ => 1,
        }
    }
}

/// Redact credential-looking values and cap the length
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    if let Some(pattern) = SECRET_PATTERN.as_ref() {
        sanitized = pattern.replace_all(&sanitized, "${1}=***").into_owned();
    }

    if let Some(pattern) = SENSITIVE_PATH_PATTERN.as_ref() {
        sanitized = pattern
            .replace_all(&sanitized, "/***REDACTED***/")
            .into_owned();
    }

    if sanitized.len() > MAX_MESSAGE_LEN {
        let mut cut = MAX_MESSAGE_LEN - TRUNCATE_SUFFIX.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str(TRUNCATE_SUFFIX);
    }

    sanitized
}

pub type HubResult<T> = Result<T, HubError>;
