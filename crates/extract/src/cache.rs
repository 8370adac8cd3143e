use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Oracle responses keyed by a hash of model and prompt, so the same
/// chunk+prompt pair is never billed twice in a run.
pub struct ResponseCache {
    responses: DashMap<String, String>,
    max_entries: usize,
}

impl ResponseCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            responses: DashMap::new(),
            max_entries,
        }
    }

    pub fn get(&self, model: &str, prompt: &str) -> Option<String> {
        let key = Self::hash_key(model, prompt);
        self.responses.get(&key).map(|r| r.value().clone())
    }

    pub fn insert(&self, model: &str, prompt: &str, response: String) {
        if self.max_entries == 0 {
            return;
        }
        if self.responses.len() >= self.max_entries {
            // Simple eviction: clear 25% when full
            let to_remove: Vec<_> = self
                .responses
                .iter()
                .take((self.max_entries / 4).max(1))
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.responses.remove(&key);
            }
        }
        self.responses.insert(Self::hash_key(model, prompt), response);
    }

    fn hash_key(model: &str, prompt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(prompt.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            responses_cached: self.responses.len(),
            max_entries: self.max_entries,
        }
    }

    pub fn clear(&self) {
        self.responses.clear();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub responses_cached: usize,
    pub max_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_by_model_and_prompt() {
        let cache = ResponseCache::new(10);
        cache.insert("llama3", "prompt", "answer".into());

        assert_eq!(cache.get("llama3", "prompt").as_deref(), Some("answer"));
        assert!(cache.get("mistral", "prompt").is_none());
        assert!(cache.get("llama3", "other").is_none());
    }

    #[test]
    fn evicts_when_full() {
        let cache = ResponseCache::new(4);
        for i in 0..10 {
            cache.insert("m", &format!("p{i}"), i.to_string());
        }
        assert!(cache.stats().responses_cached <= 4);
        assert_eq!(cache.get("m", "p9").as_deref(), Some("9"));

        cache.clear();
        assert_eq!(cache.stats().responses_cached, 0);
    }
}
