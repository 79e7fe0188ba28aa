use serde::Serialize;

/// How a device authorization run ended.
///
/// "Still waiting" is not a variant: the engine's result channel holds
/// `None` until one of these is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollResult {
    /// The code was verified and a session token obtained
    Success { token: String, hostname: String },
    /// The run failed and cannot be continued
    Error { message: String },
    /// The code expired before anyone verified it
    Timeout,
    /// Stopped by the caller
    Cancelled,
}

impl PollResult {
    pub fn error(message: impl Into<String>) -> Self {
        PollResult::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PollResult::Success { .. })
    }
}

impl std::fmt::Display for PollResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollResult::Success { hostname, .. } => write!(f, "signed in to {}", hostname),
            PollResult::Error { message } => write!(f, "sign-in failed: {}", message),
            PollResult::Timeout => write!(f, "device code expired"),
            PollResult::Cancelled => write!(f, "sign-in cancelled"),
        }
    }
}
