//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional; a bare environment yields a guest-only
//! storefront that keeps its state in `.threadline/`.
//!
//! - `THREADLINE_API_URL` - Base URL of the cart/scan REST backend
//! - `THREADLINE_API_TOKEN` - Bearer token for the backend (high entropy)
//! - `THREADLINE_DATA_DIR` - Client storage directory (default: .threadline)
//! - `THREADLINE_REMOTE_TIMEOUT_MS` - Per-call remote timeout (default: 10000)
//! - `THREADLINE_FETCH_RETRIES` - Extra attempts for remote reads (default: 2)
//! - `THREADLINE_CHECKOUT_DELAY_MS` - Simulated checkout time (default: 2000)
//! - `THREADLINE_SCAN_SECONDS` - Scan countdown length (default: 30)
//! - `THREADLINE_USER_AGENT` - User agent used to classify the scan device
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Remote backend, when one is configured
    pub remote: Option<RemoteConfig>,
    /// Directory for client-persisted key/value storage
    pub data_dir: PathBuf,
    /// Upper bound on every remote call
    pub remote_timeout: Duration,
    /// Extra attempts for remote reads after the first failure
    pub fetch_retries: u32,
    /// Simulated order processing time
    pub checkout_delay: Duration,
    /// Scan countdown length in seconds
    pub scan_seconds: u32,
    /// User agent used for scan device classification
    pub user_agent: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// REST backend configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct RemoteConfig {
    /// Base URL, always ending in `/`
    pub base_url: Url,
    /// Bearer token, if the backend requires one
    pub api_token: Option<SecretString>,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            remote: None,
            data_dir: PathBuf::from(".threadline"),
            remote_timeout: Duration::from_secs(10),
            fetch_retries: 2,
            checkout_delay: Duration::from_secs(2),
            scan_seconds: 30,
            user_agent: String::new(),
            sentry_dsn: None,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable cannot be parsed or the API token
    /// fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        let remote = RemoteConfig::from_env()?;

        Ok(Self {
            remote,
            data_dir: get_optional_env("THREADLINE_DATA_DIR").map_or(defaults.data_dir, PathBuf::from),
            remote_timeout: Duration::from_millis(parse_env_or(
                "THREADLINE_REMOTE_TIMEOUT_MS",
                10_000_u64,
            )?),
            fetch_retries: parse_env_or("THREADLINE_FETCH_RETRIES", defaults.fetch_retries)?,
            checkout_delay: Duration::from_millis(parse_env_or(
                "THREADLINE_CHECKOUT_DELAY_MS",
                2_000_u64,
            )?),
            scan_seconds: parse_positive("THREADLINE_SCAN_SECONDS", defaults.scan_seconds)?,
            user_agent: get_optional_env("THREADLINE_USER_AGENT").unwrap_or_default(),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
        })
    }
}

impl RemoteConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(raw) = get_optional_env("THREADLINE_API_URL") else {
            return Ok(None);
        };
        let api_token = match get_optional_env("THREADLINE_API_TOKEN") {
            Some(token) => {
                validate_secret_strength(&token, "THREADLINE_API_TOKEN")?;
                Some(SecretString::from(token))
            }
            None => None,
        };

        Ok(Some(Self {
            base_url: parse_base_url(&raw, "THREADLINE_API_URL")?,
            api_token,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional, non-empty environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to a default when unset.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse a strictly positive count.
fn parse_positive(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = parse_env_or(key, default)?;
    if value == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

/// Parse a base URL and make sure relative joins append to its path.
fn parse_base_url(raw: &str, key: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // Token length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-api-token", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        assert!(validate_secret_strength("abababababababab", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_parse_base_url_appends_slash() {
        let url = parse_base_url("https://api.threadline.test/v1", "TEST_URL").unwrap();
        assert_eq!(url.as_str(), "https://api.threadline.test/v1/");
        assert_eq!(
            url.join("users/u1/cart").unwrap().as_str(),
            "https://api.threadline.test/v1/users/u1/cart"
        );
    }

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        assert!(parse_base_url("ftp://api.threadline.test", "TEST_URL").is_err());
        assert!(parse_base_url("not a url", "TEST_URL").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = StorefrontConfig::default();
        assert!(config.remote.is_none());
        assert_eq!(config.scan_seconds, 30);
        assert_eq!(config.checkout_delay, Duration::from_secs(2));
        assert_eq!(config.fetch_retries, 2);
    }

    #[test]
    fn test_remote_config_debug_redacts_token() {
        let config = RemoteConfig {
            base_url: Url::parse("https://api.threadline.test/").unwrap(),
            api_token: Some(SecretString::from("super_sensitive_token_value")),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("api.threadline.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_sensitive_token_value"));
    }
}
