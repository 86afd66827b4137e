use thiserror::Error;

/// Message used when a 401 carries no server-provided explanation.
pub const AUTHENTICATION_REQUIRED: &str = "Authentication required";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unable to reach the server")]
    Transport(#[source] reqwest::Error),

    #[error("{0}")]
    SessionInvalid(String),

    #[error("Access denied")]
    AccessDenied,

    #[error("{message}")]
    RequestRejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }

    /// Build the error for a non-success status.
    ///
    /// `message` is the decoded body's `message` field, when the body had one.
    pub fn from_status(status: reqwest::StatusCode, message: Option<String>) -> Self {
        match status.as_u16() {
            401 => ApiError::SessionInvalid(
                message.unwrap_or_else(|| AUTHENTICATION_REQUIRED.to_string()),
            ),
            403 => ApiError::AccessDenied,
            code => ApiError::RequestRejected {
                status: code,
                message: message.unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("HTTP {}", code))
                }),
            },
        }
    }

    pub fn invalid_body(body: &str, reason: impl std::fmt::Display) -> Self {
        ApiError::InvalidResponse(format!("{} in body: {}", reason, Self::truncate_body(body)))
    }

    /// True for the 401 path that ends the current session.
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, ApiError::SessionInvalid(_))
    }
}
