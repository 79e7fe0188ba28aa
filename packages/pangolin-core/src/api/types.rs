use serde::{Deserialize, Serialize};

/// Envelope every Pangolin API response is wrapped in.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: u16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeviceAuthStartRequest<'a> {
    pub application_name: &'a str,
    pub device_name: &'a str,
}

/// Device code issued by the server at the start of a sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAuthStart {
    pub code: String,
    pub expires_in_seconds: u64,
}

/// Payload of the poll endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAuthPollResponse {
    pub verified: bool,
    #[serde(default)]
    pub token: Option<String>,
}

/// What the transport hands back for one poll: the decoded payload plus
/// whichever token it could find (payload first, then the session cookie).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceAuthPoll {
    pub response: DeviceAuthPollResponse,
    pub token: Option<String>,
}

impl DeviceAuthPoll {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn verified(token: Option<String>) -> Self {
        Self {
            response: DeviceAuthPollResponse {
                verified: true,
                token: token.clone(),
            },
            token,
        }
    }
}
