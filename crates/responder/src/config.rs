//! Responder runtime configuration.
//!
//! Resolved once at startup and handed to [`crate::HttpResponder::new`]. The
//! `*_from_env_value` helpers take the raw variable contents so they can be tested
//! without touching the process environment.

use crate::{ResponderError, ResponderResult};
use std::time::Duration;
use url::Url;

/// Environment variable holding the responder endpoint URL.
pub const RESPONDER_URL_ENV: &str = "TRIAGE_RESPONDER_URL";

/// Environment variable holding the request timeout in whole seconds.
pub const RESPONDER_TIMEOUT_ENV: &str = "TRIAGE_RESPONDER_TIMEOUT_SECS";

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Where and how long to wait for the external diagnostic responder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponderConfig {
    endpoint: Url,
    timeout: Duration,
}

impl ResponderConfig {
    /// Create a new `ResponderConfig`.
    ///
    /// The endpoint must be an absolute `http` or `https` URL and the timeout non-zero.
    pub fn new(endpoint: &str, timeout: Duration) -> ResponderResult<Self> {
        let endpoint = Url::parse(endpoint.trim()).map_err(|e| {
            ResponderError::InvalidConfig(format!("endpoint '{endpoint}' is not a valid URL: {e}"))
        })?;

        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ResponderError::InvalidConfig(format!(
                "endpoint scheme must be http or https, got '{}'",
                endpoint.scheme()
            )));
        }

        if timeout.is_zero() {
            return Err(ResponderError::InvalidConfig(
                "timeout must be greater than zero".into(),
            ));
        }

        Ok(Self { endpoint, timeout })
    }

    /// Reads [`RESPONDER_URL_ENV`] and [`RESPONDER_TIMEOUT_ENV`], loading `.env` first.
    pub fn from_env() -> ResponderResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_env_values(
            std::env::var(RESPONDER_URL_ENV).ok(),
            std::env::var(RESPONDER_TIMEOUT_ENV).ok(),
        )
    }

    /// Builds a config from raw environment values.
    pub fn from_env_values(url: Option<String>, timeout: Option<String>) -> ResponderResult<Self> {
        let url = url
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ResponderError::InvalidConfig(format!("{RESPONDER_URL_ENV} is not set"))
            })?;

        Self::new(&url, timeout_from_env_value(timeout)?)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Parse the request timeout from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_TIMEOUT_SECS`].
pub fn timeout_from_env_value(value: Option<String>) -> ResponderResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let secs = match value {
        Some(v) => v.parse::<u64>().map_err(|_| {
            ResponderError::InvalidConfig(format!(
                "{RESPONDER_TIMEOUT_ENV} must be a whole number of seconds, got '{v}'"
            ))
        })?,
        None => DEFAULT_TIMEOUT_SECS,
    };

    Ok(Duration::from_secs(secs))
}
