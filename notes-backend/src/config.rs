use std::env;
use std::time::Duration;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const HOST: &str = "HOST";
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    /// "true" selects the local fallback summarizer, "false" the remote model.
    pub const USE_MOCK_LLM: &str = "USE_MOCK_LLM";
    pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
    pub const OPENAI_MODEL: &str = "OPENAI_MODEL";
    pub const SUMMARY_TIMEOUT_SECS: &str = "SUMMARY_TIMEOUT_SECS";
    /// Simulated latency of the fallback summarizer, in milliseconds.
    pub const MOCK_LLM_LATENCY_MS: &str = "MOCK_LLM_LATENCY_MS";
    /// Upper bound on a single WebSocket push before the subscriber is dropped.
    pub const WS_DELIVERY_TIMEOUT_MS: &str = "WS_DELIVERY_TIMEOUT_MS";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 8000;
    pub const HOST: &str = "0.0.0.0";
    pub const USE_MOCK_LLM: bool = true;
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
    pub const OPENAI_MODEL: &str = "gpt-3.5-turbo";
    pub const SUMMARY_TIMEOUT_SECS: u64 = 30;
    pub const MOCK_LLM_LATENCY_MS: u64 = 1000;
    pub const WS_DELIVERY_TIMEOUT_MS: u64 = 5000;
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub openai_api_key: String,
    pub use_mock_llm: bool,
    pub openai_base_url: String,
    pub openai_model: String,
    pub summary_timeout: Duration,
    pub mock_llm_latency: Duration,
    pub ws_delivery_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            openai_api_key: String::new(),
            use_mock_llm: defaults::USE_MOCK_LLM,
            openai_base_url: defaults::OPENAI_BASE_URL.to_string(),
            openai_model: defaults::OPENAI_MODEL.to_string(),
            summary_timeout: Duration::from_secs(defaults::SUMMARY_TIMEOUT_SECS),
            mock_llm_latency: Duration::from_millis(defaults::MOCK_LLM_LATENCY_MS),
            ws_delivery_timeout: Duration::from_millis(defaults::WS_DELIVERY_TIMEOUT_MS),
        }
    }
}

impl Config {
    /// Load settings from the process environment (call `dotenv()` first to
    /// pick up a `.env` file). Bad values fall back to defaults with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, so tests don't have to touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            host: lookup(env_vars::HOST).unwrap_or_else(|| defaults::HOST.to_string()),
            port: parse_or(&lookup, env_vars::PORT, defaults::PORT),
            openai_api_key: lookup(env_vars::OPENAI_API_KEY).unwrap_or_default(),
            use_mock_llm: lookup(env_vars::USE_MOCK_LLM)
                .map(|v| parse_bool(env_vars::USE_MOCK_LLM, &v, defaults::USE_MOCK_LLM))
                .unwrap_or(defaults::USE_MOCK_LLM),
            openai_base_url: lookup(env_vars::OPENAI_BASE_URL)
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| defaults::OPENAI_BASE_URL.to_string()),
            openai_model: lookup(env_vars::OPENAI_MODEL)
                .unwrap_or_else(|| defaults::OPENAI_MODEL.to_string()),
            summary_timeout: Duration::from_secs(parse_or(
                &lookup,
                env_vars::SUMMARY_TIMEOUT_SECS,
                defaults::SUMMARY_TIMEOUT_SECS,
            )),
            mock_llm_latency: Duration::from_millis(parse_or(
                &lookup,
                env_vars::MOCK_LLM_LATENCY_MS,
                defaults::MOCK_LLM_LATENCY_MS,
            )),
            ws_delivery_timeout: Duration::from_millis(parse_or(
                &lookup,
                env_vars::WS_DELIVERY_TIMEOUT_MS,
                defaults::WS_DELIVERY_TIMEOUT_MS,
            )),
        }
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Invalid value for {}: {:?}, using default {}", key, raw, default);
            default
        }),
        None => default,
    }
}

fn parse_bool(key: &str, raw: &str, default: bool) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            log::warn!("Invalid boolean for {}: {:?}, using default {}", key, raw, default);
            default
        }
    }
}
