use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - token may be expired")]
    Unauthorized { message: Option<String> },

    #[error("Request failed with status {status}: {body}")]
    Rejected {
        status: StatusCode,
        message: Option<String>,
        body: String,
    },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error payload shape used by the backend
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    fn server_message_in(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        parsed
            .error
            .or(parsed.message)
            .filter(|m| !m.trim().is_empty())
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = Self::server_message_in(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized { message },
            429 => ApiError::RateLimited,
            _ => ApiError::Rejected {
                status,
                message,
                body: Self::truncate_body(body),
            },
        }
    }

    /// Message supplied by the server, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message } | ApiError::Rejected { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }
}
