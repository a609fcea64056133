use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    /// Overrides the application id returned by the token endpoint when set.
    pub rtc_app_id: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            rtc_app_id: String::new(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            api_base_url: env::var("NEXTOPINION_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| {
                    warn!("NEXTOPINION_API_URL not set, using {}", DEFAULT_API_BASE_URL);
                    DEFAULT_API_BASE_URL.to_string()
                }),
            request_timeout_secs: parse_env(
                "NEXTOPINION_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            retry_max_attempts: parse_env(
                "NEXTOPINION_RETRY_MAX_ATTEMPTS",
                DEFAULT_RETRY_MAX_ATTEMPTS,
            ),
            retry_base_delay_ms: parse_env(
                "NEXTOPINION_RETRY_BASE_DELAY_MS",
                DEFAULT_RETRY_BASE_DELAY_MS,
            ),
            rtc_app_id: env::var("NEXTOPINION_RTC_APP_ID").unwrap_or_default(),
        };

        if !config.is_configured() {
            warn!("Client not fully configured - API base URL is missing or invalid");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let url = self.api_base_url.as_str();
        !url.is_empty() && (url.starts_with("http://") || url.starts_with("https://"))
    }

    pub fn has_rtc_app_override(&self) -> bool {
        !self.rtc_app_id.trim().is_empty()
    }
}

fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
