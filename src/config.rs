//! Configuration management for the Claw Jobs agent.
//!
//! Configuration can be set via environment variables:
//! - `CLAW_API_URL` - Optional. Marketplace API base URL. Defaults to `https://claw-jobs.com/api`.
//! - `CLAW_AGENT_NAME` - Optional. Agent display name. Defaults to a generated `clawbot-xxxx`.
//! - `CLAW_CAPABILITIES` - Optional. Comma-separated capability tags. Defaults to
//!   `research,writing,summarization,data-analysis`.
//! - `CLAW_LIGHTNING_ADDRESS` - Optional. Lightning address (`name@domain`) to receive payouts.
//! - `CLAW_STATE_FILE` - Optional. Identity state file path. Defaults to `agent_state.json`.
//! - `CLAW_POLL_INTERVAL_SECS` - Optional. Initial status poll interval. Defaults to `5`.
//! - `CLAW_POLL_MAX_ATTEMPTS` - Optional. Maximum status polls per wait. Defaults to `30`.
//! - `CLAW_RUN_INTERVAL_SECS` - Optional. Sleep between cycles in loop mode. Defaults to `300`.
//! - `CLAW_AWAIT_PAYMENT` - Optional. Poll for payment confirmation after delivery. Defaults to `false`.
//! - `CLAW_RUN_LOOP` - Optional. Run continuously instead of a single cycle. Defaults to `false`.

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use thiserror::Error;

/// Default capability tags, matching what the marketplace categorises on.
const DEFAULT_CAPABILITIES: &str = "research,writing,summarization,data-analysis";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Invalid Lightning address: {0}")]
    InvalidLightningAddress(String),
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Marketplace API base URL (includes the `/api` prefix)
    pub api_url: String,

    /// Agent display name used at registration
    pub agent_name: String,

    /// Declared capability tags, used for gig selection
    pub capabilities: Vec<String>,

    /// Lightning address for payouts
    pub lightning_address: Option<String>,

    /// Path of the identity state file
    pub state_file: PathBuf,

    /// Initial interval between status polls (doubles per attempt, capped)
    pub poll_interval: Duration,

    /// Maximum status polls before a wait times out
    pub poll_max_attempts: u32,

    /// Sleep between workflow cycles in loop mode
    pub run_interval: Duration,

    /// Whether to poll for payment confirmation after delivery
    pub await_payment: bool,

    /// Whether to run continuously instead of a single cycle
    pub run_loop: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparseable numeric settings
    /// and `ConfigError::InvalidLightningAddress` for a malformed payout
    /// address.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = std::env::var("CLAW_API_URL")
            .unwrap_or_else(|_| "https://claw-jobs.com/api".to_string());

        let agent_name =
            std::env::var("CLAW_AGENT_NAME").unwrap_or_else(|_| generated_agent_name());

        let capabilities = parse_capabilities(
            &std::env::var("CLAW_CAPABILITIES")
                .unwrap_or_else(|_| DEFAULT_CAPABILITIES.to_string()),
        );

        let lightning_address = match std::env::var("CLAW_LIGHTNING_ADDRESS") {
            Ok(addr) if !addr.trim().is_empty() => {
                let addr = addr.trim().to_string();
                if !is_lightning_address(&addr) {
                    return Err(ConfigError::InvalidLightningAddress(addr));
                }
                Some(addr)
            }
            _ => None,
        };

        let state_file = std::env::var("CLAW_STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("agent_state.json"));

        let poll_interval = Duration::from_secs(env_secs("CLAW_POLL_INTERVAL_SECS", 5)?);
        let poll_max_attempts = env_u64("CLAW_POLL_MAX_ATTEMPTS", 30)? as u32;
        let run_interval = Duration::from_secs(env_secs("CLAW_RUN_INTERVAL_SECS", 300)?);

        Ok(Self {
            api_url,
            agent_name,
            capabilities,
            lightning_address,
            state_file,
            poll_interval,
            poll_max_attempts,
            run_interval,
            await_payment: env_bool("CLAW_AWAIT_PAYMENT", false),
            run_loop: env_bool("CLAW_RUN_LOOP", false),
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(
        api_url: impl Into<String>,
        agent_name: impl Into<String>,
        capabilities: Vec<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            agent_name: agent_name.into(),
            capabilities,
            lightning_address: None,
            state_file: PathBuf::from("agent_state.json"),
            poll_interval: Duration::from_secs(5),
            poll_max_attempts: 30,
            run_interval: Duration::from_secs(300),
            await_payment: false,
            run_loop: false,
        }
    }
}

/// Generate a default agent name with a random 4-character suffix.
fn generated_agent_name() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(4)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("clawbot-{}", suffix)
}

/// Split a comma-separated capability list, trimming and dropping empties.
fn parse_capabilities(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Check a Lightning address (`local@domain`, email-shaped).
fn is_lightning_address(addr: &str) -> bool {
    let pattern = Regex::new(r"(?i)^[a-z0-9._%+-]+@[a-z0-9-]+(\.[a-z0-9-]+)+$").unwrap();
    pattern.is_match(addr)
}

/// Parse an environment variable as a boolean, returning `default` if unset.
///
/// Recognises `1`, `true`, `yes`, `y`, `on` (case-insensitive) as `true`.
fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        Err(_) => default,
    }
}

fn env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

fn env_secs(name: &str, default: u64) -> Result<u64, ConfigError> {
    let secs = env_u64(name, default)?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "must be at least 1 second".to_string(),
        ));
    }
    Ok(secs)
}
