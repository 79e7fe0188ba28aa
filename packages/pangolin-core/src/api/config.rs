use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Pangolin server
pub const DEFAULT_HOSTNAME: &str = "https://app.pangolin.net";

/// Delay between two poll requests
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Per-request timeout applied by the HTTP transport
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable name for hostname override
const ENV_ENDPOINT: &str = "PANGOLIN_ENDPOINT";

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    auth: Option<AuthSection>,
}

#[derive(Debug, Deserialize, Default)]
struct AuthSection {
    /// Server to sign in against (e.g., "https://pangolin.example.com")
    hostname: Option<String>,
    poll_interval_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
}

/// Runtime sign-in configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AuthConfig {
    pub hostname: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    /// Where the hostname came from (for logging)
    pub source: ConfigSource,
}

/// Where the configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Using default hardcoded values
    Default,
    /// Loaded from environment variable
    Environment,
    /// Loaded from config file
    ConfigFile,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
        }
    }
}

/// Get the path to the configuration file
fn get_config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("pangolin").join("config.toml"))
}

/// Load configuration from a file, logging and ignoring anything unusable
fn load_config_file(path: &Path) -> Option<ConfigFile> {
    if !path.exists() {
        return None;
    }

    match fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

fn clean_hostname(raw: &str) -> Option<String> {
    let host = raw.trim().trim_end_matches('/');
    (!host.is_empty()).then(|| host.to_string())
}

fn resolve(env_hostname: Option<String>, file: Option<ConfigFile>) -> AuthConfig {
    let section = file.and_then(|f| f.auth).unwrap_or_default();

    let poll_interval = section
        .poll_interval_ms
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_POLL_INTERVAL);
    let request_timeout = section
        .request_timeout_secs
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

    // Priority 1: Environment variable
    if let Some(hostname) = env_hostname.as_deref().and_then(clean_hostname) {
        tracing::info!("Using hostname from environment variable: {}", hostname);
        return AuthConfig {
            hostname,
            poll_interval,
            request_timeout,
            source: ConfigSource::Environment,
        };
    }

    // Priority 2: Config file
    if let Some(hostname) = section.hostname.as_deref().and_then(clean_hostname) {
        tracing::info!("Using hostname from config file: {}", hostname);
        return AuthConfig {
            hostname,
            poll_interval,
            request_timeout,
            source: ConfigSource::ConfigFile,
        };
    }

    // Priority 3: Default values
    tracing::debug!("Using default hostname: {}", DEFAULT_HOSTNAME);
    AuthConfig {
        hostname: DEFAULT_HOSTNAME.to_string(),
        poll_interval,
        request_timeout,
        source: ConfigSource::Default,
    }
}

/// Load sign-in configuration with priority:
/// 1. Environment variable (PANGOLIN_ENDPOINT)
/// 2. Config file (~/.config/pangolin/config.toml)
/// 3. Default values
///
/// Timing settings come from the config file when present regardless of
/// where the hostname was taken from.
pub fn load_auth_config() -> AuthConfig {
    let file = get_config_file_path().and_then(|p| load_config_file(&p));
    resolve(std::env::var(ENV_ENDPOINT).ok(), file)
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/pangolin/config.toml".to_string())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# Pangolin Configuration
# Place this file at: ~/.config/pangolin/config.toml

[auth]
# Server to sign in against
# Default: https://app.pangolin.net
# hostname = "https://pangolin.example.com"

# Delay between device authorization polls, in milliseconds
# poll_interval_ms = 2000

# Per-request timeout, in seconds
# request_timeout_secs = 30
"#
    .to_string()
}
