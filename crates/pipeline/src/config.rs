use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use extract::{
    AnthropicClient, LanguageModel, LlmOracle, OllamaClient, OracleSettings, ResponseCache,
    RetryPolicy,
};

/// Problems that stop a run before any chunk is processed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("an output directory is required when updating after each chunk")]
    MissingOutputDir,
    #[error("a base filename is required when updating after each chunk")]
    MissingBaseFilename,
    #[error("invalid chunk selection: {0}")]
    ChunkSelection(String),
    #[error("oracle setup failed: {0}")]
    Oracle(String),
}

/// Missing sections and fields fall back to the balanced preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: OperationMode,
    pub oracle: OracleConfig,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Fast,     // cache aggressively, short timeouts
    Accurate, // always fresh, patient retries
    Balanced,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub provider: Provider,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub extraction_temperature: f32,
    pub extraction_max_tokens: u32,
    pub critic_temperature: f32,
    pub critic_max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub max_concurrent_critic_calls: usize,
    pub request_timeout_secs: u64,
    pub call_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Anthropic,
            model: "claude-3-5-sonnet-20241022".to_string(),
            base_url: None,
            extraction_temperature: 0.1,
            extraction_max_tokens: 8000,
            critic_temperature: 0.2,
            critic_max_tokens: 4000,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperationMode::Balanced,
            oracle: OracleConfig::default(),
            concurrency: ConcurrencyConfig {
                max_concurrent_critic_calls: 3,
                request_timeout_secs: 60,
                call_delay_ms: 500,
            },
            retry: RetryConfig {
                max_retries: 3,
                initial_backoff_ms: 1000,
                max_backoff_ms: 10000,
            },
            cache: CacheConfig {
                enabled: true,
                max_entries: 10000,
            },
        }
    }
}

impl AppConfig {
    pub fn for_mode(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Fast => Self::fast_mode(),
            OperationMode::Accurate => Self::accurate_mode(),
            OperationMode::Balanced => Self::default(),
        }
    }

    pub fn fast_mode() -> Self {
        Self {
            mode: OperationMode::Fast,
            concurrency: ConcurrencyConfig {
                max_concurrent_critic_calls: 8,
                request_timeout_secs: 30,
                call_delay_ms: 100,
            },
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 500,
                max_backoff_ms: 5000,
            },
            cache: CacheConfig {
                enabled: true,
                max_entries: 50000,
            },
            ..Self::default()
        }
    }

    pub fn accurate_mode() -> Self {
        Self {
            mode: OperationMode::Accurate,
            concurrency: ConcurrencyConfig {
                max_concurrent_critic_calls: 1,
                request_timeout_secs: 120,
                call_delay_ms: 500,
            },
            retry: RetryConfig {
                max_retries: 5,
                initial_backoff_ms: 2000,
                max_backoff_ms: 20000,
            },
            cache: CacheConfig {
                enabled: false,
                max_entries: 0,
            },
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn oracle_settings(&self) -> OracleSettings {
        OracleSettings {
            extraction_temperature: self.oracle.extraction_temperature,
            extraction_max_tokens: self.oracle.extraction_max_tokens,
            critic_temperature: self.oracle.critic_temperature,
            critic_max_tokens: self.oracle.critic_max_tokens,
            request_timeout: Duration::from_secs(self.concurrency.request_timeout_secs),
            call_delay: Duration::from_millis(self.concurrency.call_delay_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            self.retry.initial_backoff_ms,
            self.retry.max_backoff_ms,
        )
    }

    /// The configured language model. Anthropic needs `ANTHROPIC_API_KEY`.
    pub fn language_model(&self) -> Result<Arc<dyn LanguageModel>, ConfigError> {
        let model = self.oracle.model.clone();
        let base_url = self.oracle.base_url.clone();
        match self.oracle.provider {
            Provider::Anthropic => AnthropicClient::from_env(model, base_url)
                .map(|client| Arc::new(client) as Arc<dyn LanguageModel>)
                .map_err(|e| ConfigError::Oracle(e.to_string())),
            Provider::Ollama => {
                let base_url = base_url.unwrap_or_else(|| "http://localhost:11434".to_string());
                Ok(Arc::new(OllamaClient::new(base_url, model)))
            }
        }
    }

    pub fn build_oracle(
        &self,
        model: Arc<dyn LanguageModel>,
        cancel: CancellationToken,
    ) -> LlmOracle {
        let oracle = LlmOracle::new(model, self.oracle_settings())
            .with_retry(self.retry_policy())
            .with_cancellation(cancel);
        if self.cache.enabled && self.cache.max_entries > 0 {
            oracle.with_cache(Arc::new(ResponseCache::new(self.cache.max_entries)))
        } else {
            oracle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn modes_pick_presets() {
        let fast = AppConfig::for_mode(OperationMode::Fast);
        assert_eq!(fast.concurrency.max_concurrent_critic_calls, 8);
        assert!(!AppConfig::for_mode(OperationMode::Accurate).cache.enabled);
        assert_eq!(AppConfig::for_mode(OperationMode::Balanced).mode, OperationMode::Balanced);
    }

    #[test]
    fn loads_json_file() {
        let mut config = AppConfig::accurate_mode();
        config.oracle.provider = Provider::Ollama;
        config.oracle.model = "llama3".into();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&config).unwrap().as_bytes()).unwrap();

        let loaded = AppConfig::load(file.path()).unwrap();
        assert_eq!(loaded.mode, OperationMode::Accurate);
        assert_eq!(loaded.oracle.provider, Provider::Ollama);
        assert_eq!(loaded.retry.max_retries, 5);
    }

    #[test]
    fn partial_file_fills_from_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"oracle": {"provider": "ollama", "model": "llama3"}}"#).unwrap();

        let loaded = AppConfig::load(file.path()).unwrap();
        assert_eq!(loaded.oracle.provider, Provider::Ollama);
        assert_eq!(loaded.oracle.extraction_max_tokens, 8000);
        assert_eq!(loaded.mode, OperationMode::Balanced);
        assert!(loaded.cache.enabled);
    }

    #[test]
    fn bad_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        assert!(matches!(AppConfig::load(file.path()), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            AppConfig::load(Path::new("/definitely/not/here.json")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn settings_follow_config() {
        let config = AppConfig::fast_mode();
        let settings = config.oracle_settings();
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.call_delay, Duration::from_millis(100));
    }
}
