//! Pangolin CLI - sign in to a Pangolin server from the terminal
//!
//! This binary can:
//! - Request a device code and wait for it to be approved in a browser
//! - Resume polling for a code issued elsewhere
//! - Show which server and timings are configured

mod host;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use host::SignInHost;
use pangolin_core::api::{self, AuthConfig, PangolinClient};
use pangolin_core::auth::{self, PollResult};

/// Application name reported to the server when requesting a device code
const APPLICATION_NAME: &str = "Pangolin CLI";

#[derive(Parser)]
#[command(name = "pangolin")]
#[command(version)]
#[command(about = "Sign in to a Pangolin server using device authorization")]
#[command(long_about = "
Pangolin CLI signs this machine in to a Pangolin server. It requests a
short device code, you approve it in a browser, and the CLI waits until
the server confirms the sign-in.

Quick start:
  1. Sign in:          pangolin login
  2. Other server:     pangolin login --hostname pangolin.example.com
  3. Show settings:    pangolin config
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Request a device code and wait for it to be approved
    #[command(alias = "connect")]
    Login {
        /// Server to sign in to (overrides configuration)
        #[arg(long)]
        hostname: Option<String>,

        /// Name shown to the approver for this device
        #[arg(long)]
        device_name: Option<String>,

        /// Don't try to open the verification page in a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Wait for an already issued device code to be approved
    Poll {
        /// Device code to poll for
        #[arg(long)]
        code: String,

        /// Seconds until the code expires
        #[arg(long)]
        expires_in: u64,

        /// Server that issued the code (overrides configuration)
        #[arg(long)]
        hostname: Option<String>,
    },

    /// Show configuration paths and settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pangolin={},pangolin_core={}", log_level, log_level).into()),
        )
        .with_target(false)
        .init();

    match &cli.command {
        Commands::Login {
            hostname,
            device_name,
            no_browser,
        } => cmd_login(&cli, hostname.clone(), device_name.clone(), *no_browser).await,
        Commands::Poll {
            code,
            expires_in,
            hostname,
        } => cmd_poll(&cli, code, *expires_in, hostname.clone()).await,
        Commands::Config => cmd_config(&cli),
    }
}

fn default_device_name() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "pangolin-cli".to_string())
}

async fn cmd_login(
    cli: &Cli,
    hostname: Option<String>,
    device_name: Option<String>,
    no_browser: bool,
) -> Result<()> {
    let config = api::load_auth_config();
    let hostname = hostname.unwrap_or_else(|| config.hostname.clone());
    let device_name = device_name.unwrap_or_else(default_device_name);

    let client = PangolinClient::with_timeout(&hostname, config.request_timeout)
        .with_context(|| format!("Invalid hostname '{}'", hostname))?;

    if let OutputFormat::Text = cli.format {
        println!("Starting sign-in to {}...", client.base_url());
    }

    let open_browser = !no_browser && matches!(cli.format, OutputFormat::Text);
    let started = auth::request_device_code(&client, APPLICATION_NAME, &device_name, open_browser)
        .await
        .context("Failed to request device code")?;

    match cli.format {
        OutputFormat::Text => {
            println!();
            println!("Please visit the following URL to approve this device:\n\n{}\n", started.verification_url);
            println!("Code: {}", started.code);
            println!("Waiting for approval (expires in {}s, Ctrl+C to cancel)...", started.expires_in_seconds);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({
                "status": "awaiting_authorization",
                "verification_url": started.verification_url,
                "code": started.code,
                "expires_in": started.expires_in_seconds,
            }));
        }
    }

    run_sign_in(cli, &config, &started.code, &hostname, started.expires_in_seconds).await
}

async fn cmd_poll(cli: &Cli, code: &str, expires_in: u64, hostname: Option<String>) -> Result<()> {
    let config = api::load_auth_config();
    let hostname = hostname.unwrap_or_else(|| config.hostname.clone());

    if let OutputFormat::Text = cli.format {
        println!("Waiting for code {} on {} (expires in {}s)...", code, hostname, expires_in);
    }

    run_sign_in(cli, &config, code, &hostname, expires_in).await
}

async fn run_sign_in(
    cli: &Cli,
    config: &AuthConfig,
    code: &str,
    hostname: &str,
    expires_in: u64,
) -> Result<()> {
    let host = SignInHost::from_config(config);
    host.on_start_requested(code, hostname, expires_in)?;
    let result = host.wait_for_result().await;
    host.shutdown();

    report(cli, &result?)
}

fn report(cli: &Cli, result: &PollResult) -> Result<()> {
    match cli.format {
        OutputFormat::Text => match result {
            PollResult::Success { hostname, .. } => {
                println!();
                println!("Signed in to {}", hostname);
            }
            other => {
                eprintln!();
                eprintln!("{}", capitalize(&other.to_string()));
            }
        },
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_value(result).context("Failed to serialize result")?
            );
        }
    }

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn cmd_config(cli: &Cli) -> Result<()> {
    let config = api::load_auth_config();
    let config_path = api::config::get_config_file_path_string();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file:      {}", config_path);
            println!("Hostname:         {} (from {})", config.hostname, config.source);
            println!("Poll interval:    {}ms", config.poll_interval.as_millis());
            println!("Request timeout:  {}s", config.request_timeout.as_secs());
            println!();
            println!("Environment variables:");
            println!("  PANGOLIN_ENDPOINT - Override hostname");
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", api::config::generate_example_config());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({
                "config_file": config_path,
                "hostname": config.hostname,
                "hostname_source": config.source.to_string(),
                "poll_interval_ms": config.poll_interval.as_millis() as u64,
                "request_timeout_secs": config.request_timeout.as_secs(),
            }));
        }
    }

    Ok(())
}
