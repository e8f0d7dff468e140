use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Secret access failed: {reason}")]
    SecretAccess { reason: String },

    #[error("Secret payload is missing string field {key}")]
    MissingSecretKey { key: String },

    #[error("Storage error for {key}: {reason}")]
    Storage { key: String, reason: String },

    #[error("Object not found: {key}")]
    ObjectNotFound { key: String },

    #[error("Download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid trigger payload: {0}")]
    InvalidTrigger(String),

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Custom result type
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn secret_access(reason: impl Into<String>) -> Self {
        Self::SecretAccess {
            reason: reason.into(),
        }
    }

    pub fn missing_secret_key(key: &str) -> Self {
        Self::MissingSecretKey {
            key: key.to_string(),
        }
    }

    pub fn storage(key: &str, reason: impl Into<String>) -> Self {
        Self::Storage {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn object_not_found(key: &str) -> Self {
        Self::ObjectNotFound {
            key: key.to_string(),
        }
    }

    pub fn download(url: &str, reason: impl Into<String>) -> Self {
        Self::Download {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_trigger(reason: impl Into<String>) -> Self {
        Self::InvalidTrigger(reason.into())
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Network(e) => !e.is_builder(),
            AppError::HttpStatus { status, .. } => is_retryable_status(*status),
            AppError::Io(_) | AppError::Storage { .. } | AppError::Download { .. } => true,
            _ => false,
        }
    }

    /// Failures that abort a whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::SecretAccess { .. }
                | AppError::MissingSecretKey { .. }
                | AppError::ObjectNotFound { .. }
                | AppError::Json(_)
                | AppError::Base64(_)
                | AppError::InvalidTrigger(_)
                | AppError::Config(_)
                | AppError::Validation { .. }
        )
    }
}

/// Timeouts, throttling and server-side failures.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}
