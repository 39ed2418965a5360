use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as float: {source}")]
    ParseFloat {
        name: String,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
///
/// Every upstream credential is optional: the service degrades per-source
/// rather than refusing to start (see the classifier's neutral fallback and
/// the source clients' empty outcomes).
#[derive(Debug, Clone)]
pub struct Config {
    // Geocoding
    pub geocode_base_url: String,
    pub geocode_api_key: Option<String>,

    // NewsAPI
    pub newsapi_base_url: String,
    pub newsapi_key: Option<String>,
    pub newsapi_page_size: usize,
    pub newsapi_max_pages: usize,

    // GDELT
    pub gdelt_base_url: String,
    pub gdelt_max_records: usize,

    // Bluesky firehose
    pub firehose_url: String,
    pub firehose_enabled: bool,
    pub firehose_buffer_capacity: usize,
    pub firehose_buffer_window: Duration,
    pub firehose_reconnect_delay: Duration,

    // LLM backend (OpenAI-compatible chat completions)
    pub llm_base_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,

    // Pipeline
    pub cache_ttl: Duration,
    pub spread_radius_km: f64,
    pub top_posts_limit: usize,
    pub filter_llm_assist: bool,
    pub mock_source_enabled: bool,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Geocoding
            geocode_base_url: env_or_default("GEOCODE_BASE_URL", "https://api.opencagedata.com"),
            geocode_api_key: optional_env("GEOCODE_API_KEY"),

            // NewsAPI
            newsapi_base_url: env_or_default("NEWSAPI_BASE_URL", "https://newsapi.org"),
            newsapi_key: optional_env("NEWSAPI_KEY"),
            newsapi_page_size: parse_env_usize("NEWSAPI_PAGE_SIZE", 50)?,
            newsapi_max_pages: parse_env_usize("NEWSAPI_MAX_PAGES", 2)?,

            // GDELT
            gdelt_base_url: env_or_default("GDELT_BASE_URL", "https://api.gdeltproject.org"),
            gdelt_max_records: parse_env_usize("GDELT_MAX_RECORDS", 250)?,

            // Bluesky firehose
            firehose_url: env_or_default(
                "FIREHOSE_URL",
                "wss://jetstream2.us-east.bsky.network/subscribe?wantedCollections=app.bsky.feed.post",
            ),
            firehose_enabled: parse_env_bool("FIREHOSE_ENABLED", true)?,
            firehose_buffer_capacity: parse_env_usize("FIREHOSE_BUFFER_CAPACITY", 1000)?,
            firehose_buffer_window: Duration::from_secs(parse_env_u64(
                "FIREHOSE_BUFFER_WINDOW_SECS",
                600,
            )?),
            firehose_reconnect_delay: Duration::from_secs(parse_env_u64(
                "FIREHOSE_RECONNECT_DELAY_SECS",
                5,
            )?),

            // LLM backend
            llm_base_url: env_or_default("LLM_BASE_URL", "https://api.openai.com"),
            llm_api_key: optional_env("LLM_API_KEY"),
            llm_model: env_or_default("LLM_MODEL", "gpt-4o-mini"),

            // Pipeline
            cache_ttl: Duration::from_secs(parse_env_u64("CACHE_TTL_SECS", 30)?),
            spread_radius_km: parse_env_f64("SPREAD_RADIUS_KM", 50.0)?,
            top_posts_limit: parse_env_usize("TOP_POSTS_LIMIT", 10)?,
            filter_llm_assist: parse_env_bool("FILTER_LLM_ASSIST", false)?,
            mock_source_enabled: parse_env_bool("MOCK_SOURCE_ENABLED", false)?,

            // Web server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.newsapi_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "NEWSAPI_PAGE_SIZE".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.gdelt_max_records == 0 {
            return Err(ConfigError::InvalidValue {
                name: "GDELT_MAX_RECORDS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.firehose_buffer_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                name: "FIREHOSE_BUFFER_CAPACITY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !self.spread_radius_km.is_finite() || self.spread_radius_km <= 0.0 {
            return Err(ConfigError::InvalidValue {
                name: "SPREAD_RADIUS_KM".to_string(),
                message: "must be a positive finite number".to_string(),
            });
        }
        if self.top_posts_limit == 0 {
            return Err(ConfigError::InvalidValue {
                name: "TOP_POSTS_LIMIT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// A configuration suitable for tests: no firehose, placeholder upstream
    /// URLs that individual tests override with a mock server.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            geocode_base_url: "http://127.0.0.1:0".to_string(),
            geocode_api_key: Some("test-geocode-key".to_string()),
            newsapi_base_url: "http://127.0.0.1:0".to_string(),
            newsapi_key: Some("test-news-key".to_string()),
            newsapi_page_size: 50,
            newsapi_max_pages: 2,
            gdelt_base_url: "http://127.0.0.1:0".to_string(),
            gdelt_max_records: 250,
            firehose_url: "ws://127.0.0.1:0".to_string(),
            firehose_enabled: false,
            firehose_buffer_capacity: 1000,
            firehose_buffer_window: Duration::from_secs(600),
            firehose_reconnect_delay: Duration::from_secs(5),
            llm_base_url: "http://127.0.0.1:0".to_string(),
            llm_api_key: Some("test-llm-key".to_string()),
            llm_model: "test-model".to_string(),
            cache_ttl: Duration::from_secs(30),
            spread_radius_km: 50.0,
            top_posts_limit: 10,
            filter_llm_assist: false,
            mock_source_enabled: false,
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
        }
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_f64(name: &str, default: f64) -> Result<f64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseFloat {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
