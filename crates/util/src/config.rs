use std::{env, fmt, net::SocketAddr, time::Duration};

use url::Url;

use super::{server_bind_address, DEFAULT_API_BASE_URL};

const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SSE_HEARTBEAT_SECS: u64 = 20;

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Where the board gets its initial contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardSeed {
    /// Built-in sample applications.
    Demo,
    /// A full fetch from the backend at startup.
    Fetch,
}

impl BoardSeed {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "demo" => Ok(Self::Demo),
            "fetch" => Ok(Self::Fetch),
            other => Err(ConfigError::InvalidBoardSeed(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Fetch => "fetch",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub api_base_url: Url,
    pub api_token: Option<String>,
    pub api_timeout: Duration,
    pub board_seed: BoardSeed,
    pub sse_heartbeat: Duration,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;

        let base_value =
            env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = parse_base_url(&base_value)?;

        let api_token = env::var("API_TOKEN")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let api_timeout = Duration::from_secs(read_secs(
            "API_TIMEOUT_SECS",
            DEFAULT_API_TIMEOUT_SECS,
        )?);
        let sse_heartbeat = Duration::from_secs(read_secs(
            "SSE_HEARTBEAT_SECS",
            DEFAULT_SSE_HEARTBEAT_SECS,
        )?);

        let board_seed = match env::var("BOARD_SEED") {
            Ok(value) => BoardSeed::from_str(value.trim())?,
            Err(_) => BoardSeed::Demo,
        };

        Ok(Self {
            bind_addr,
            environment,
            api_base_url,
            api_token,
            api_timeout,
            board_seed,
            sse_heartbeat,
        })
    }
}

/// Parses the backend base URL; a trailing slash is added so relative joins
/// keep the last path segment.
fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(value.trim())
        .map_err(|err| ConfigError::ApiBaseUrl(format!("{value}: {err}")))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::ApiBaseUrl(format!(
            "{value}: not a hierarchical url"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn read_secs(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(value) => match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(ConfigError::InvalidSeconds { key, value }),
        },
        Err(_) => Ok(default),
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    ApiBaseUrl(String),
    InvalidSeconds { key: &'static str, value: String },
    InvalidBoardSeed(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::ApiBaseUrl(detail) => write!(f, "invalid API_BASE_URL value: {detail}"),
            Self::InvalidSeconds { key, value } => {
                write!(f, "{key} must be a positive number of seconds (got {value})")
            }
            Self::InvalidBoardSeed(value) => {
                write!(f, "BOARD_SEED must be 'demo' or 'fetch' (got {value})")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
pub(crate) static ENV_GUARD: std::sync::LazyLock<std::sync::Mutex<()>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(()));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_BIND_ADDR;

    const KEYS: [&str; 7] = [
        "APP_ENV",
        "APP_BIND_ADDR",
        "API_BASE_URL",
        "API_TOKEN",
        "API_TIMEOUT_SECS",
        "BOARD_SEED",
        "SSE_HEARTBEAT_SECS",
    ];

    fn clear_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_in_development() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();

        let config = AppConfig::from_env().expect("config should load with defaults");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.api_base_url.as_str(), DEFAULT_API_BASE_URL);
        assert_eq!(config.api_token, None);
        assert_eq!(config.api_timeout, Duration::from_secs(30));
        assert_eq!(config.board_seed, BoardSeed::Demo);
        assert_eq!(config.sse_heartbeat, Duration::from_secs(20));
    }

    #[test]
    fn rejects_invalid_environment() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("APP_ENV", "invalid");

        let err = AppConfig::from_env().expect_err("invalid env should error");
        assert!(matches!(err, ConfigError::InvalidEnvironment(value) if value == "invalid"));

        clear_env();
    }

    #[test]
    fn parses_production_environment() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("APP_ENV", "production");
        env::set_var("APP_BIND_ADDR", "0.0.0.0:9000");
        env::set_var("API_BASE_URL", "https://jobs.example.com/api");
        env::set_var("API_TOKEN", " secret ");
        env::set_var("BOARD_SEED", "fetch");
        env::set_var("API_TIMEOUT_SECS", "5");

        let config = AppConfig::from_env().expect("config should load");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:9000");
        assert_eq!(config.api_base_url.as_str(), "https://jobs.example.com/api/");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.board_seed, BoardSeed::Fetch);
        assert_eq!(config.api_timeout, Duration::from_secs(5));

        clear_env();
    }

    #[test]
    fn rejects_zero_heartbeat() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("SSE_HEARTBEAT_SECS", "0");

        let err = AppConfig::from_env().expect_err("zero heartbeat should error");
        assert!(matches!(
            err,
            ConfigError::InvalidSeconds { key: "SSE_HEARTBEAT_SECS", .. }
        ));

        clear_env();
    }

    #[test]
    fn rejects_unknown_seed_and_bad_url() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("BOARD_SEED", "sqlite");
        let err = AppConfig::from_env().expect_err("unknown seed should error");
        assert!(matches!(err, ConfigError::InvalidBoardSeed(value) if value == "sqlite"));

        clear_env();
        env::set_var("API_BASE_URL", "not a url");
        let err = AppConfig::from_env().expect_err("bad url should error");
        assert!(err.to_string().starts_with("invalid API_BASE_URL value"));

        clear_env();
    }
}
