//! Errors returned by the hosted backend client

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Postgres unique constraint violation
pub const UNIQUE_VIOLATION: &str = "23505";

/// "JSON object requested, multiple (or no) rows returned"
pub const NOT_SINGLE_ROW: &str = "PGRST116";

/// Failure talking to the hosted backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend answered with a non-success status
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<String>,
        hint: Option<String>,
    },

    /// Transport failure (connect, timeout, TLS, body decode)
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// Request or response body could not be (de)serialized
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed backend URL
    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),

    /// An operation needed a session and none is stored
    #[error("Auth session missing!")]
    SessionMissing,

    /// Local session storage failed
    #[error("Session storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl BackendError {
    /// Error code reported by the backend, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            BackendError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// HTTP status reported by the backend, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the insert hit a unique constraint
    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some(UNIQUE_VIOLATION)
    }

    /// True when the backend rejected the credentials or token
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    pub(crate) fn not_single_row(rows: usize) -> Self {
        BackendError::Api {
            status: StatusCode::NOT_ACCEPTABLE.as_u16(),
            code: Some(NOT_SINGLE_ROW.to_string()),
            message: "JSON object requested, multiple (or no) rows returned".to_string(),
            details: Some(format!("The result contains {rows} rows")),
            hint: None,
        }
    }

    /// Build an error from a failed response body.
    ///
    /// Understands both the REST error shape (`code`, `message`,
    /// `details`, `hint`) and the auth error shapes (`error_code`,
    /// `msg`, `error_description`).
    pub(crate) fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

        let code = match parsed.code {
            Some(serde_json::Value::String(code)) => Some(code),
            _ => None,
        }
        .or(parsed.error_code);

        let message = parsed
            .message
            .or(parsed.msg)
            .or(parsed.error_description)
            .or(parsed.error)
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string()
                } else {
                    trimmed.to_string()
                }
            });

        let details = match parsed.details {
            Some(serde_json::Value::String(details)) => Some(details),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };

        BackendError::Api {
            status: status.as_u16(),
            code,
            message,
            details,
            hint: parsed.hint,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<serde_json::Value>,
    error_code: Option<String>,
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    details: Option<serde_json::Value>,
    hint: Option<String>,
}
