use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use ingest::Chunk;

use crate::cache::ResponseCache;
use crate::error::OracleError;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::prompt;
use crate::retry::RetryPolicy;
use crate::schema::{EntityType, ExtractionTarget};

/// What the critic wants scored, serialized as the model will see it.
#[derive(Debug, Clone, PartialEq)]
pub enum CritiqueSubject {
    Entity {
        entity_type: EntityType,
        record: Value,
    },
    Relationship {
        record: Value,
        source: Option<Value>,
        target: Option<Value>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CritiqueRequest {
    pub subject: CritiqueSubject,
    /// Bounded excerpt of the chunk the subject came from; empty when unknown.
    pub chunk_preview: String,
    pub supporting_text: String,
}

/// The external extraction/evaluation service, seen as two capabilities.
/// Both return the raw model text; decoding is the caller's job.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn extract(&self, chunk: &Chunk, target: ExtractionTarget) -> Result<String, OracleError>;

    async fn critique(&self, request: &CritiqueRequest) -> Result<String, OracleError>;

    /// Counters for the calls made so far.
    fn call_stats(&self) -> CallStats {
        CallStats::default()
    }
}

#[derive(Debug, Clone)]
pub struct OracleSettings {
    pub extraction_temperature: f32,
    pub extraction_max_tokens: u32,
    pub critic_temperature: f32,
    pub critic_max_tokens: u32,
    pub request_timeout: Duration,
    /// Pause after every model call, as a courtesy to rate limits.
    pub call_delay: Duration,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            extraction_temperature: 0.1,
            extraction_max_tokens: 8000,
            critic_temperature: 0.2,
            critic_max_tokens: 4000,
            request_timeout: Duration::from_secs(60),
            call_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Default)]
struct CallCounters {
    calls: AtomicUsize,
    failures: AtomicUsize,
    cache_hits: AtomicUsize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CallStats {
    pub calls: usize,
    pub failures: usize,
    pub cache_hits: usize,
}

/// `Oracle` backed by a language model, with prompts, timeout, retry,
/// response cache and cancellation layered on.
pub struct LlmOracle {
    model: Arc<dyn LanguageModel>,
    settings: OracleSettings,
    retry: RetryPolicy,
    cache: Option<Arc<ResponseCache>>,
    cancel: CancellationToken,
    counters: CallCounters,
}

impl LlmOracle {
    pub fn new(model: Arc<dyn LanguageModel>, settings: OracleSettings) -> Self {
        Self {
            model,
            settings,
            retry: RetryPolicy::none(),
            cache: None,
            cancel: CancellationToken::new(),
            counters: CallCounters::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn stats(&self) -> CallStats {
        CallStats {
            calls: self.counters.calls.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
        }
    }

    async fn call(&self, request: CompletionRequest) -> Result<String, OracleError> {
        if self.cancel.is_cancelled() {
            return Err(OracleError::Cancelled);
        }

        let model_name = self.model.model_name();
        let cache_key = format!("{}\n{}", request.system, request.prompt);
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(model_name, &cache_key)) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(model = model_name, "Oracle cache hit");
            return Ok(hit);
        }

        self.counters.calls.fetch_add(1, Ordering::Relaxed);
        let timeout = self.settings.request_timeout;
        let result = self
            .retry
            .retry("oracle call", || async {
                tokio::select! {
                    _ = self.cancel.cancelled() => Err(OracleError::Cancelled),
                    outcome = tokio::time::timeout(timeout, self.model.complete(&request)) => {
                        outcome.unwrap_or(Err(OracleError::Timeout(timeout)))
                    }
                }
            })
            .await;

        match &result {
            Ok(text) => {
                if let Some(cache) = &self.cache {
                    cache.insert(model_name, &cache_key, text.clone());
                }
            }
            Err(_) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
            }
        }

        if !self.settings.call_delay.is_zero() {
            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = tokio::time::sleep(self.settings.call_delay) => {}
            }
        }

        result
    }
}

#[async_trait]
impl Oracle for LlmOracle {
    async fn extract(
        &self,
        chunk: &Chunk,
        target: ExtractionTarget,
    ) -> Result<String, OracleError> {
        self.call(CompletionRequest {
            system: prompt::system_for(target).to_string(),
            prompt: prompt::build_extraction_prompt(target, &chunk.text),
            temperature: self.settings.extraction_temperature,
            max_tokens: self.settings.extraction_max_tokens,
        })
        .await
    }

    async fn critique(&self, request: &CritiqueRequest) -> Result<String, OracleError> {
        self.call(CompletionRequest {
            system: prompt::CRITIC_SYSTEM.to_string(),
            prompt: prompt::build_critique_prompt(request),
            temperature: self.settings.critic_temperature,
            max_tokens: self.settings.critic_max_tokens,
        })
        .await
    }

    fn call_stats(&self) -> CallStats {
        self.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Model that answers from a script and records every prompt.
    struct ScriptedModel {
        replies: Mutex<Vec<Result<String, OracleError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String, OracleError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(OracleError::EmptyResponse);
            }
            replies.remove(0)
        }
    }

    fn quick_settings() -> OracleSettings {
        OracleSettings {
            call_delay: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
            ..OracleSettings::default()
        }
    }

    #[tokio::test]
    async fn identical_prompts_hit_the_cache() {
        let model = ScriptedModel::new(vec![Ok("{\"events\": []}".into())]);
        let oracle = LlmOracle::new(model.clone(), quick_settings())
            .with_cache(Arc::new(ResponseCache::new(100)));
        let chunk = Chunk::from_text("The Earth Summit took place in 1992.");
        let target = ExtractionTarget::Entities(EntityType::Event);

        let first = oracle.extract(&chunk, target).await.unwrap();
        let second = oracle.extract(&chunk, target).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(model.prompts.lock().unwrap().len(), 1);
        let stats = oracle.stats();
        assert_eq!(stats.calls, 1);
        assert_eq!(stats.cache_hits, 1);
    }

    #[tokio::test]
    async fn cancelled_oracle_refuses_calls() {
        let model = ScriptedModel::new(vec![Ok("{}".into())]);
        let cancel = CancellationToken::new();
        let oracle =
            LlmOracle::new(model.clone(), quick_settings()).with_cancellation(cancel.clone());
        cancel.cancel();

        let err = oracle
            .extract(&Chunk::from_text("text"), ExtractionTarget::Relationships)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failures_are_counted_after_retries() {
        let model = ScriptedModel::new(vec![
            Err(OracleError::EmptyResponse),
            Err(OracleError::EmptyResponse),
        ]);
        let oracle = LlmOracle::new(model.clone(), quick_settings())
            .with_retry(RetryPolicy::new(1, 1, 1));

        let result = oracle
            .extract(&Chunk::from_text("text"), ExtractionTarget::Relationships)
            .await;

        assert!(result.is_err());
        assert_eq!(model.prompts.lock().unwrap().len(), 2);
        assert_eq!(oracle.stats().failures, 1);
    }
}
