use thiserror::Error;

/// Failure classification for a single API call.
///
/// Causes are captured as text when the error is built, so values can be
/// cloned into results and compared in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Endpoint could not be built from the hostname and path
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Body missing or unusable where one was required
    #[error("Invalid response from server")]
    InvalidResponse,

    /// Non-2xx status; `message` is the server-supplied text, if any
    #[error("HTTP error {status}{}", message_suffix(.message))]
    Http { status: u16, message: Option<String> },

    /// DNS, connect, socket timeout and friends
    #[error("Network error: {0}")]
    Network(String),

    /// Payload did not match the expected schema
    #[error("Failed to decode response: {0}")]
    Decoding(String),
}

fn message_suffix(message: &Option<String>) -> String {
    match message {
        Some(m) if !m.trim().is_empty() => format!(": {}", m),
        _ => String::new(),
    }
}

impl ApiError {
    /// Text suitable for showing to the person signing in.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Http {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            ApiError::Http { status, .. } => format!("Server returned error: {}", status),
            other => other.to_string(),
        }
    }

    /// 404 on the poll endpoint means the verification record does not exist yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Http { status: 404, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decoding(e.to_string())
        } else if e.is_builder() {
            ApiError::InvalidUrl(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}
