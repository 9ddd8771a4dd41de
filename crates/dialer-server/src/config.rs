//! Server Configuration
//!
//! Read from Shuttle secrets (`Secrets.toml`) through a key lookup, so tests
//! can feed a plain map. Blank values count as unset.

use std::str::FromStr;
use std::time::Duration;

use crate::adapters::provider::ProviderConfig;
use crate::application::DispatchLoopConfig;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bearer key for the API; `None` disables authentication
    pub api_key: Option<String>,
    /// `None` disables dispatching
    pub provider: Option<ProviderConfig>,
    pub public_base_url: String,
    pub signing_secret: Option<String>,
    pub max_concurrent_calls: i64,
    pub max_retry_attempts: i32,
    pub dispatch: DispatchLoopConfig,
    /// `None` disables expiry of stale PENDING calls
    pub pending_ttl: Option<chrono::Duration>,
    /// How long a claimed call may go without provider acceptance before the
    /// sweeper returns it to PENDING
    pub dispatch_lease: chrono::Duration,
    pub sweep_interval: Duration,
}

/// Upper bound for second-based spans (one year)
const MAX_SPAN_SECS: i64 = 365 * 24 * 60 * 60;

impl AppConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match get("PROVIDER_BASE_URL") {
            Some(base_url) => {
                if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                    return Err(ConfigError::Invalid {
                        key: "PROVIDER_BASE_URL",
                        value: base_url,
                        reason: "expected an http(s) URL".to_string(),
                    });
                }
                let mut provider = ProviderConfig::new(base_url);
                provider.api_key = get("PROVIDER_API_KEY");
                provider.timeout =
                    Duration::from_secs(parse_min(&get, "PROVIDER_TIMEOUT_SECS", 30u64, 1)?);
                Some(provider)
            }
            None => None,
        };

        let pending_ttl = parse_span(&get, "PENDING_TTL_SECS", 86_400, 0)?;
        let dispatch_lease = parse_span(&get, "DISPATCH_LEASE_SECS", 600, 1)?;

        if let Some(provider) = &provider {
            let lease = dispatch_lease.to_std().unwrap_or_default();
            if lease <= provider.timeout {
                return Err(ConfigError::Invalid {
                    key: "DISPATCH_LEASE_SECS",
                    value: dispatch_lease.num_seconds().to_string(),
                    reason: format!(
                        "must exceed PROVIDER_TIMEOUT_SECS ({})",
                        provider.timeout.as_secs()
                    ),
                });
            }
        }

        Ok(Self {
            api_key: get("DIALER_API_KEY"),
            provider,
            public_base_url: get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8000".to_string())
                .trim_end_matches('/')
                .to_string(),
            signing_secret: get("COMPLETION_SIGNING_SECRET"),
            max_concurrent_calls: parse_min(&get, "MAX_CONCURRENT_CALLS", 10, 1)?,
            max_retry_attempts: parse_min(&get, "MAX_RETRY_ATTEMPTS", 3, 1)?,
            dispatch: DispatchLoopConfig {
                at_capacity_interval: Duration::from_millis(parse_min(
                    &get,
                    "AT_CAPACITY_INTERVAL_MS",
                    5000,
                    1,
                )?),
                idle_interval: Duration::from_millis(parse_min(&get, "IDLE_INTERVAL_MS", 2000, 1)?),
                error_backoff: Duration::from_millis(parse_min(
                    &get,
                    "ERROR_BACKOFF_MS",
                    5000,
                    1,
                )?),
                shutdown_grace: Duration::from_secs(parse_min(&get, "SHUTDOWN_GRACE_SECS", 10, 0)?),
            },
            pending_ttl: (pending_ttl > chrono::Duration::zero()).then_some(pending_ttl),
            dispatch_lease,
            sweep_interval: Duration::from_secs(parse_min(&get, "SWEEP_INTERVAL_SECS", 300, 1)?),
        })
    }

    /// Where the provider posts completion signals
    pub fn completion_callback_url(&self) -> String {
        format!("{}/callbacks/completion", self.public_base_url)
    }
}

/// Parse `key` if set, else `default`; values below `min` are rejected
fn parse_min<T, G>(get: &G, key: &'static str, default: T, min: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + std::fmt::Display,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(default);
    };

    let value: T = raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })?;

    if value < min {
        return Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: format!("must be at least {min}"),
        });
    }
    Ok(value)
}

/// Parse a span in seconds between `min` and one year
fn parse_span<G>(
    get: &G,
    key: &'static str,
    default: i64,
    min: i64,
) -> Result<chrono::Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let secs: i64 = parse_min(get, key, default, min)?;

    let too_long = || ConfigError::Invalid {
        key,
        value: secs.to_string(),
        reason: format!("must be at most {MAX_SPAN_SECS}"),
    };
    if secs > MAX_SPAN_SECS {
        return Err(too_long());
    }
    chrono::Duration::try_seconds(secs).ok_or_else(too_long)
}
