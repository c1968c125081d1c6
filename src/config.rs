// ⚙️ Configuration
// Built once at startup from the environment (plus .env via dotenvy in the
// binaries) and handed down explicitly. Nothing reads env vars after this.

use crate::error::ConfigError;
use std::time::Duration;

pub const DEFAULT_PUBLIC_API_URL: &str = "https://www.receitaws.com.br/v1/cnpj";
pub const DEFAULT_START_YEAR: i32 = 2020;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 500;
pub const DEFAULT_ID_COLUMN: &str = "cnpj_part";
pub const DEFAULT_OUTPUT_SHEET: &str = "CONSULTA";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

// ============================================================================
// SECTIONS
// ============================================================================

/// How to reach the CNPJ registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Gateway endpoint (POST). When absent the public lookup is used.
    pub gateway_url: Option<String>,
    pub api_key: Option<String>,
    /// Public lookup base (GET `{base}/{cnpj}`).
    pub public_url: String,
    pub client_timeout: Duration,
    /// Sent to the gateway as its own upstream timeout, in seconds.
    pub upstream_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            gateway_url: None,
            api_key: None,
            public_url: DEFAULT_PUBLIC_API_URL.to_string(),
            client_timeout: Duration::from_secs(60),
            upstream_timeout_secs: 300,
        }
    }
}

/// Knobs for one batch run.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub start_year: i32,
    /// Pause after each entity to respect the registry's rate limit.
    pub request_delay: Duration,
    pub id_column: String,
    pub output_sheet: String,
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings {
            start_year: DEFAULT_START_YEAR,
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            output_sheet: DEFAULT_OUTPUT_SHEET.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub batch: BatchSettings,
    pub server: ServerConfig,
}

// ============================================================================
// LOADING
// ============================================================================

impl Config {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup (tests pass a map).
    ///
    /// | variable          | default                |
    /// |-------------------|------------------------|
    /// | `API_URL`         | unset (public lookup)  |
    /// | `API_KEY`         | unset                  |
    /// | `PUBLIC_API_URL`  | receitaws              |
    /// | `START_YEAR`      | 2020                   |
    /// | `REQUEST_DELAY_MS`| 500                    |
    /// | `BIND_ADDR`       | 0.0.0.0:3000           |
    /// | `MAX_UPLOAD_BYTES`| 20 MiB                 |
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Config::default();

        config.registry.gateway_url = non_blank("API_URL").map(|v| v.trim().to_string());
        config.registry.api_key = non_blank("API_KEY");
        if let Some(url) = non_blank("PUBLIC_API_URL") {
            config.registry.public_url = url.trim().trim_end_matches('/').to_string();
        }

        if let Some(value) = non_blank("START_YEAR") {
            config.batch.start_year = parse_number("START_YEAR", &value)?;
        }
        if let Some(value) = non_blank("REQUEST_DELAY_MS") {
            config.batch.request_delay = Duration::from_millis(parse_number("REQUEST_DELAY_MS", &value)?);
        }

        if let Some(addr) = non_blank("BIND_ADDR") {
            config.server.bind_addr = addr;
        }
        if let Some(value) = non_blank("MAX_UPLOAD_BYTES") {
            config.server.max_upload_bytes = parse_number("MAX_UPLOAD_BYTES", &value)?;
        }

        Ok(config)
    }
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err: T::Err| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: err.to_string(),
        })
}
