// Runtime configuration, read once at startup and passed by reference.
// Missing values are checked per request so the process keeps running
// without any of them.

use crate::error::{RelayError, Result};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
pub const DEFAULT_LANGUAGES_PATH: &str = "/languages/all";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    /// Base URL of the execution service, without trailing slash.
    pub judge_base_url: Option<String>,
    pub judge_api_key: Option<String>,
    pub rapidapi_host: Option<String>,
    /// Path of the language catalog endpoint; deployments differ between
    /// `/languages` and `/languages/all`.
    pub judge_languages_path: String,
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("PREPD_BIND", DEFAULT_BIND_ADDR),
            judge_base_url: std::env::var("JUDGE0_URL")
                .ok()
                .map(|url| trim_base_url(&url)),
            judge_api_key: non_empty_env("JUDGE0_KEY"),
            rapidapi_host: non_empty_env("JUDGE0_RAPIDAPI_HOST"),
            judge_languages_path: env_or("JUDGE0_LANGUAGES_PATH", DEFAULT_LANGUAGES_PATH),
            llm_api_key: non_empty_env("GROQ_API_KEY"),
            llm_base_url: std::env::var("LLM_BASE_URL")
                .map(|url| trim_base_url(&url))
                .unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_string()),
            llm_model: env_or("LLM_MODEL", DEFAULT_LLM_MODEL),
        }
    }

    /// Execution service base URL, or the configuration error the relay
    /// reports before attempting any outbound call.
    pub fn judge_base_url(&self) -> Result<&str> {
        self.judge_base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(RelayError::Configuration("Judge0 URL"))
    }

    pub fn llm_api_key(&self) -> Result<&str> {
        self.llm_api_key
            .as_deref()
            .ok_or(RelayError::Configuration("Groq API key"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            judge_base_url: None,
            judge_api_key: None,
            rapidapi_host: None,
            judge_languages_path: DEFAULT_LANGUAGES_PATH.to_string(),
            llm_api_key: None,
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
        }
    }
}

/// Strip trailing slashes so endpoint paths can be appended verbatim.
pub fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_base_url() {
        assert_eq!(trim_base_url("http://judge0:2358/"), "http://judge0:2358");
        assert_eq!(trim_base_url("http://judge0:2358//"), "http://judge0:2358");
        assert_eq!(trim_base_url("http://judge0:2358"), "http://judge0:2358");
    }

    #[test]
    fn test_missing_judge_url_is_a_configuration_error() {
        let config = Config::default();
        let err = config.judge_base_url().unwrap_err();
        assert_eq!(err.to_string(), "Judge0 URL not configured");
    }

    #[test]
    fn test_missing_llm_key_is_a_configuration_error() {
        let config = Config::default();
        let err = config.llm_api_key().unwrap_err();
        assert_eq!(err.to_string(), "Groq API key not configured");
    }

    #[test]
    fn test_configured_values_pass_through() {
        let config = Config {
            judge_base_url: Some("http://judge0:2358".to_string()),
            llm_api_key: Some("k".to_string()),
            ..Config::default()
        };
        assert_eq!(config.judge_base_url().unwrap(), "http://judge0:2358");
        assert_eq!(config.llm_api_key().unwrap(), "k");
    }
}
