use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SECRETS_PATH: &str = "Secrets.env";
pub const DEFAULT_PRODUCT_ENDPOINT: &str = "https://world.openfoodfacts.org";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub openai_endpoint: String,
    pub openai_model: String,
    pub secrets_path: PathBuf,
    pub product_endpoint: String,
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_endpoint: DEFAULT_OPENAI_ENDPOINT.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            secrets_path: PathBuf::from(DEFAULT_SECRETS_PATH),
            product_endpoint: DEFAULT_PRODUCT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any variable source; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let request_timeout = match lookup("INSIDE_REQUEST_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    log::warn!(
                        "⚠️ Invalid INSIDE_REQUEST_TIMEOUT_SECS '{}', using {}s",
                        raw,
                        DEFAULT_TIMEOUT_SECS
                    );
                    defaults.request_timeout
                }
            },
            None => defaults.request_timeout,
        };

        Self {
            openai_endpoint: lookup("INSIDE_OPENAI_ENDPOINT").unwrap_or(defaults.openai_endpoint),
            openai_model: lookup("INSIDE_OPENAI_MODEL").unwrap_or(defaults.openai_model),
            secrets_path: lookup("INSIDE_SECRETS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.secrets_path),
            product_endpoint: lookup("INSIDE_PRODUCT_ENDPOINT").unwrap_or(defaults.product_endpoint),
            request_timeout,
        }
    }
}
