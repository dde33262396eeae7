use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_API_URL: &str = "https://developer-api.nest.com";
pub const DEFAULT_MINUTES: u64 = 10;
pub const DEFAULT_OUTPUT: &str = "nest.tsv";
pub const DEFAULT_LAST_OUTPUT: &str = "nest_last.json";
/// Largest poll interval whose length in seconds still fits a `u64`.
pub const MAX_MINUTES: u64 = u64::MAX / 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("must provide a thermostat id")]
    MissingThermostatId,
    #[error("must provide a token")]
    MissingToken,
    #[error("minutes parameter is not a parseable number: {0:?}")]
    InvalidMinutes(String),
    #[error("minutes parameter must be at least 1")]
    MinutesTooSmall,
    #[error("minutes parameter must be at most {}", MAX_MINUTES)]
    MinutesTooLarge,
    #[error("debug flag is not a boolean: {0:?}")]
    InvalidDebug(String),
    #[error("invalid {field} url: {value:?}")]
    InvalidUrl { field: &'static str, value: String },
}

/// Settings for one run of the watchdog. Built once, never mutated while polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogConfig {
    pub thermostat_id: String,
    pub token: String,
    pub minutes: u64,
    pub output: PathBuf,
    pub last_output: PathBuf,
    pub debug: bool,
    pub webhook_post: Option<String>,
    pub webhook_get: Option<String>,
    pub api_url: String,
}

impl WatchdogConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.minutes.saturating_mul(60))
    }

    /// Layers `overrides` on top of an optional config file and validates the result.
    pub fn resolve(
        file: Option<ConfigFile>,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();

        let thermostat_id = pick(overrides.thermostat_id, file.thermostat_id)
            .ok_or(ConfigError::MissingThermostatId)?;
        let token = pick(overrides.token, file.token).ok_or(ConfigError::MissingToken)?;

        let minutes = match non_empty(overrides.minutes) {
            Some(raw) => parse_minutes(&raw)?,
            None => match file.minutes {
                Some(minutes) if minutes >= 1 => bounded_minutes(minutes)?,
                _ => DEFAULT_MINUTES,
            },
        };

        let debug = match non_empty(overrides.debug) {
            Some(raw) => parse_flag(&raw)?,
            None => file.debug.unwrap_or(false),
        };

        let output = pick(overrides.output, file.output).unwrap_or_else(|| DEFAULT_OUTPUT.into());
        let last_output = pick(overrides.last_output, file.last_output)
            .unwrap_or_else(|| DEFAULT_LAST_OUTPUT.into());

        let webhook_post = pick(overrides.webhook_post, file.webhook_post)
            .map(|url| validate_url("webhook-post", url))
            .transpose()?;
        let webhook_get = pick(overrides.webhook_get, file.webhook_get)
            .map(|url| validate_url("webhook-get", url))
            .transpose()?;
        let api_url = validate_url(
            "api",
            pick(overrides.api_url, file.api_url).unwrap_or_else(|| DEFAULT_API_URL.into()),
        )?
        .trim_end_matches('/')
        .to_owned();

        Ok(Self {
            thermostat_id,
            token,
            minutes,
            output: output.into(),
            last_output: last_output.into(),
            debug,
            webhook_post,
            webhook_get,
            api_url,
        })
    }
}

/// On-disk JSON layout. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub thermostat_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub minutes: Option<i64>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub last_output: Option<String>,
    #[serde(default)]
    pub debug: Option<bool>,
    #[serde(default)]
    pub webhook_post: Option<String>,
    #[serde(default)]
    pub webhook_get: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
}

/// Raw override values, typically read from the environment. Empty strings count as unset.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub thermostat_id: Option<String>,
    pub token: Option<String>,
    pub minutes: Option<String>,
    pub output: Option<String>,
    pub last_output: Option<String>,
    pub debug: Option<String>,
    pub webhook_post: Option<String>,
    pub webhook_get: Option<String>,
    pub api_url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn pick(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    non_empty(primary).or_else(|| non_empty(fallback))
}

fn parse_minutes(raw: &str) -> Result<u64, ConfigError> {
    let minutes = raw
        .parse::<i64>()
        .map_err(|_| ConfigError::InvalidMinutes(raw.to_owned()))?;
    if minutes < 1 {
        return Err(ConfigError::MinutesTooSmall);
    }
    bounded_minutes(minutes)
}

fn bounded_minutes(minutes: i64) -> Result<u64, ConfigError> {
    u64::try_from(minutes)
        .ok()
        .filter(|minutes| *minutes <= MAX_MINUTES)
        .ok_or(ConfigError::MinutesTooLarge)
}

fn parse_flag(raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidDebug(raw.to_owned())),
    }
}

/// Accepts absolute `http`/`https` URLs with a host. The original text is kept.
fn validate_url(field: &'static str, value: String) -> Result<String, ConfigError> {
    let usable = Url::parse(&value).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|host| !host.is_empty())
    });

    if usable {
        Ok(value)
    } else {
        Err(ConfigError::InvalidUrl { field, value })
    }
}
