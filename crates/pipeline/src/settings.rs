use std::time::Duration;

use dermascan_vision::http::DEFAULT_MODEL;
use dermascan_vision::policy::RetryPolicy;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// Images analysed per request unless configured otherwise.
pub const DEFAULT_MAX_BATCH: usize = 3;

/// Largest batch size accepted from configuration.
pub const MAX_BATCH_LIMIT: usize = 5;

/// Engine configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development; without an API
/// key every analysis returns the fallback report.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    /// Service credential; `None` routes every analysis to the fallback.
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    /// Images per analysis; extra captured images are ignored.
    pub max_batch: usize,
    pub retry: RetryPolicy,
    /// Whether fallback reports are jittered.
    pub fallback_jitter: bool,
    /// Skip the service entirely and always return the fallback report.
    pub skip_remote: bool,
    /// Lifetime of cached reports; zero disables the cache.
    pub cache_ttl: Duration,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_batch: DEFAULT_MAX_BATCH,
            retry: RetryPolicy::default(),
            fallback_jitter: true,
            skip_remote: false,
            cache_ttl: Duration::ZERO,
        }
    }
}

/// Errors produced while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl AnalysisSettings {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                          | Default                     |
    /// |----------------------------------|-----------------------------|
    /// | `DERMASCAN_API_KEY`              | unset                       |
    /// | `DERMASCAN_API_URL`              | `https://api.openai.com/v1` |
    /// | `DERMASCAN_MODEL`                | `gpt-4o-mini`               |
    /// | `DERMASCAN_MAX_BATCH`            | `3` (1..=5)                 |
    /// | `DERMASCAN_MAX_ATTEMPTS`         | `3`                         |
    /// | `DERMASCAN_RETRY_BASE_MS`        | `1000`                      |
    /// | `DERMASCAN_INTER_CALL_MS`        | `1000`                      |
    /// | `DERMASCAN_REQUEST_TIMEOUT_SECS` | `30`                        |
    /// | `DERMASCAN_FALLBACK_JITTER`      | `true`                      |
    /// | `DERMASCAN_SKIP_REMOTE`          | `false`                     |
    /// | `DERMASCAN_CACHE_TTL_SECS`       | `0`                         |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let max_batch = parse_or(
            "DERMASCAN_MAX_BATCH",
            get("DERMASCAN_MAX_BATCH"),
            defaults.max_batch,
        )?;
        if !(1..=MAX_BATCH_LIMIT).contains(&max_batch) {
            return Err(ConfigError::Invalid {
                var: "DERMASCAN_MAX_BATCH",
                value: max_batch.to_string(),
                reason: "must be between 1 and 5",
            });
        }

        let max_attempts: u32 = parse_or(
            "DERMASCAN_MAX_ATTEMPTS",
            get("DERMASCAN_MAX_ATTEMPTS"),
            defaults.retry.max_attempts,
        )?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "DERMASCAN_MAX_ATTEMPTS",
                value: "0".into(),
                reason: "must be at least 1",
            });
        }

        let request_timeout_secs: u64 = parse_or(
            "DERMASCAN_REQUEST_TIMEOUT_SECS",
            get("DERMASCAN_REQUEST_TIMEOUT_SECS"),
            defaults.retry.request_timeout.as_secs(),
        )?;
        if request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "DERMASCAN_REQUEST_TIMEOUT_SECS",
                value: "0".into(),
                reason: "must be at least 1",
            });
        }

        let retry = RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(parse_or(
                "DERMASCAN_RETRY_BASE_MS",
                get("DERMASCAN_RETRY_BASE_MS"),
                defaults.retry.base_delay.as_millis() as u64,
            )?),
            inter_call_delay: Duration::from_millis(parse_or(
                "DERMASCAN_INTER_CALL_MS",
                get("DERMASCAN_INTER_CALL_MS"),
                defaults.retry.inter_call_delay.as_millis() as u64,
            )?),
            request_timeout: Duration::from_secs(request_timeout_secs),
        };

        Ok(Self {
            api_key: get("DERMASCAN_API_KEY"),
            api_url: get("DERMASCAN_API_URL").unwrap_or(defaults.api_url),
            model: get("DERMASCAN_MODEL").unwrap_or(defaults.model),
            max_batch,
            retry,
            fallback_jitter: parse_bool(
                "DERMASCAN_FALLBACK_JITTER",
                get("DERMASCAN_FALLBACK_JITTER"),
                defaults.fallback_jitter,
            )?,
            skip_remote: parse_bool(
                "DERMASCAN_SKIP_REMOTE",
                get("DERMASCAN_SKIP_REMOTE"),
                defaults.skip_remote,
            )?,
            cache_ttl: Duration::from_secs(parse_or(
                "DERMASCAN_CACHE_TTL_SECS",
                get("DERMASCAN_CACHE_TTL_SECS"),
                0,
            )?),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            var,
            value,
            reason: "not a valid number",
        }),
    }
}

fn parse_bool(var: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::Invalid {
            var,
            value: raw.unwrap_or_default(),
            reason: "expected true or false",
        }),
    }
}
