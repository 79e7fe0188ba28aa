use super::config::DEFAULT_REQUEST_TIMEOUT;
use super::error::ApiError;
use super::types::{
    ApiResponse, DeviceAuthPoll, DeviceAuthPollResponse, DeviceAuthStart, DeviceAuthStartRequest,
};
use crate::auth::{DeviceAuthTransport, TransportConnector};
use reqwest::header::{HeaderMap, SET_COOKIE};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

const CSRF_HEADER: &str = "X-CSRF-Token";
const CSRF_VALUE: &str = "x-csrf-protection";

/// Cookie the server sets once a device code has been verified
const SESSION_COOKIE: &str = "p_session_token";

/// HTTP client for one Pangolin server.
#[derive(Debug, Clone)]
pub struct PangolinClient {
    base_url: Url,
    http: reqwest::Client,
}

impl PangolinClient {
    pub fn new(hostname: &str) -> Result<Self, ApiError> {
        Self::with_timeout(hostname, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(hostname: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = normalize_hostname(hostname)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Page the user opens to approve `code`.
    pub fn verification_url(&self, code: &str) -> Result<Url, ApiError> {
        let mut url = self.endpoint(&["auth", "login", "device"])?;
        url.query_pairs_mut().append_pair("code", code);
        Ok(url)
    }

    /// Ask the server for a new device code.
    pub async fn start_device_auth(
        &self,
        application_name: &str,
        device_name: &str,
    ) -> Result<DeviceAuthStart, ApiError> {
        let url = self.endpoint(&["api", "v1", "auth", "device-web-auth", "start"])?;

        let resp = self
            .http
            .post(url)
            .header(CSRF_HEADER, CSRF_VALUE)
            .json(&DeviceAuthStartRequest {
                application_name,
                device_name,
            })
            .send()
            .await?;

        let start: DeviceAuthStart = read_envelope(resp).await?;
        if start.code.trim().is_empty() {
            return Err(ApiError::InvalidResponse);
        }

        tracing::info!(
            "Device code issued by {} (expires in {}s)",
            self.base_url,
            start.expires_in_seconds
        );
        Ok(start)
    }

    /// Check whether `code` has been approved yet.
    pub async fn poll_device_auth(&self, code: &str) -> Result<DeviceAuthPoll, ApiError> {
        let url = self.endpoint(&["api", "v1", "auth", "device-web-auth", "poll", code])?;

        let resp = self
            .http
            .get(url)
            .header(CSRF_HEADER, CSRF_VALUE)
            .send()
            .await?;

        let cookie_token = session_cookie(resp.headers());
        let response: DeviceAuthPollResponse = read_envelope(resp).await?;

        let token = response
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .or(cookie_token);

        Ok(DeviceAuthPoll { response, token })
    }
}

impl DeviceAuthTransport for PangolinClient {
    async fn poll_device_auth(&self, code: &str) -> Result<DeviceAuthPoll, ApiError> {
        PangolinClient::poll_device_auth(self, code).await
    }
}

/// Connects sessions to real servers over HTTP.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    request_timeout: Duration,
}

impl HttpConnector {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl TransportConnector for HttpConnector {
    type Transport = PangolinClient;

    fn connect(&self, hostname: &str) -> Result<PangolinClient, ApiError> {
        PangolinClient::with_timeout(hostname, self.request_timeout)
    }
}

/// Turn a user-supplied hostname into a base URL. A bare host gets `https://`.
pub(crate) fn normalize_hostname(hostname: &str) -> Result<Url, ApiError> {
    let trimmed = hostname.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ApiError::InvalidUrl("hostname is empty".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url =
        Url::parse(&candidate).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", candidate, e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ApiError::InvalidUrl(candidate));
    }

    Ok(url)
}

async fn read_envelope<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    if !status.is_success() {
        return Err(ApiError::Http {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    if body.trim().is_empty() {
        return Err(ApiError::InvalidResponse);
    }

    let envelope: ApiResponse<T> =
        serde_json::from_str(&body).map_err(|e| ApiError::Decoding(e.to_string()))?;

    envelope.data.ok_or(ApiError::InvalidResponse)
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiResponse<serde_json::Value>>(body)
        .ok()
        .map(|envelope| envelope.message)
        .filter(|m| !m.trim().is_empty())
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn bare_host_gets_https() {
        let url = normalize_hostname(" pangolin.example.com/ ").unwrap();
        assert_eq!(url.as_str(), "https://pangolin.example.com/");
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let url = normalize_hostname("http://127.0.0.1:3000").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:3000/");
    }

    #[test]
    fn unusable_hostnames_are_invalid_url() {
        assert!(matches!(normalize_hostname(""), Err(ApiError::InvalidUrl(_))));
        assert!(matches!(normalize_hostname("ftp://files.example.com"), Err(ApiError::InvalidUrl(_))));
        assert!(matches!(normalize_hostname("https://exa mple.com"), Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn endpoint_keeps_path_prefix_and_encodes_code() {
        let client = PangolinClient::new("https://example.com/pangolin/").unwrap();
        let url = client
            .endpoint(&["api", "v1", "auth", "device-web-auth", "poll", "ab/cd"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/pangolin/api/v1/auth/device-web-auth/poll/ab%2Fcd"
        );
    }

    #[test]
    fn verification_url_carries_code() {
        let client = PangolinClient::new("example.com").unwrap();
        let url = client.verification_url("ABCD-1234").unwrap();
        assert_eq!(url.as_str(), "https://example.com/auth/login/device?code=ABCD-1234");
    }

    #[test]
    fn session_cookie_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("other=1; Path=/"));
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("p_session_token=tok123; Path=/; HttpOnly"),
        );
        assert_eq!(session_cookie(&headers), Some("tok123".to_string()));
    }

    #[test]
    fn empty_session_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("p_session_token=; Max-Age=0"));
        assert_eq!(session_cookie(&headers), None);
    }

    #[test]
    fn error_message_prefers_envelope() {
        assert_eq!(
            error_message(r#"{"data":null,"success":false,"error":true,"message":"Code expired","status":400}"#),
            Some("Code expired".to_string())
        );
        assert_eq!(error_message("Bad Gateway"), Some("Bad Gateway".to_string()));
        assert_eq!(error_message(""), None);
    }
}
