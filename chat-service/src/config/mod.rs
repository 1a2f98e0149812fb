use crate::services::conversational::{
    ConversationalOptions, DEFAULT_HYBRID_TIMEOUT, DEFAULT_SWEEP_EVERY,
};
use crate::services::retrieval::DEFAULT_TOP_K;
use crate::services::session_store::DEFAULT_SESSION_TIMEOUT_MINUTES;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub session: SessionConfig,
    pub retrieval: RetrievalConfig,
    pub hybrid: HybridConfig,
    pub ollama: OllamaSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Idle minutes before a session expires.
    pub timeout_minutes: i64,
    /// Sweep expired sessions every Nth query.
    pub sweep_every: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Context passages retrieved per question.
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HybridConfig {
    /// Seconds to wait for both strategies before falling back.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaSettings {
    pub base_url: String,
    pub model: String,
}

impl ChatConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(ChatConfig {
            common: common_config,
            session: SessionConfig {
                timeout_minutes: get_env(
                    "CHAT_SESSION_TIMEOUT_MINUTES",
                    Some(&DEFAULT_SESSION_TIMEOUT_MINUTES.to_string()),
                    is_prod,
                )?
                .parse()
                .unwrap_or(DEFAULT_SESSION_TIMEOUT_MINUTES),
                sweep_every: get_env(
                    "CHAT_SWEEP_EVERY",
                    Some(&DEFAULT_SWEEP_EVERY.to_string()),
                    is_prod,
                )?
                .parse()
                .unwrap_or(DEFAULT_SWEEP_EVERY),
            },
            retrieval: RetrievalConfig {
                top_k: get_env(
                    "CHAT_RETRIEVAL_TOP_K",
                    Some(&DEFAULT_TOP_K.to_string()),
                    is_prod,
                )?
                .parse()
                .unwrap_or(DEFAULT_TOP_K),
            },
            hybrid: HybridConfig {
                timeout_secs: get_env(
                    "CHAT_HYBRID_TIMEOUT_SECS",
                    Some(&DEFAULT_HYBRID_TIMEOUT.as_secs().to_string()),
                    is_prod,
                )?
                .parse()
                .unwrap_or(DEFAULT_HYBRID_TIMEOUT.as_secs()),
            },
            ollama: OllamaSettings {
                base_url: get_env(
                    "OLLAMA_URL",
                    Some("http://localhost:11434/api/generate"),
                    is_prod,
                )?,
                model: get_env("OLLAMA_MODEL", Some("deepseek-coder"), is_prod)?,
            },
        })
    }

    /// Session idle timeout.
    pub fn session_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session.timeout_minutes)
    }

    /// Bound on hybrid dispatch.
    pub fn hybrid_timeout(&self) -> Duration {
        Duration::from_secs(self.hybrid.timeout_secs)
    }
}

impl From<&ChatConfig> for ConversationalOptions {
    fn from(config: &ChatConfig) -> Self {
        ConversationalOptions {
            hybrid_timeout: config.hybrid_timeout(),
            sweep_every: config.session.sweep_every,
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load_outside_production() {
        let config = ChatConfig::load().expect("config should load with defaults");

        assert_eq!(config.session.timeout_minutes, 30);
        assert_eq!(config.session.sweep_every, 10);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.hybrid.timeout_secs, 30);
        assert_eq!(config.ollama.model, "deepseek-coder");

        let options = ConversationalOptions::from(&config);
        assert_eq!(options.hybrid_timeout, Duration::from_secs(30));
        assert_eq!(options.sweep_every, 10);
    }
}
