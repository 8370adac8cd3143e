pub mod cache;
pub mod coerce;
pub mod error;
pub mod json;
pub mod llm;
pub mod oracle;
pub mod prompt;
pub mod retry;
pub mod schema;
pub mod support;

pub use cache::ResponseCache;
pub use error::{ExtractionError, OracleError, ParseError};
pub use llm::{AnthropicClient, LanguageModel, OllamaClient};
pub use oracle::{CallStats, CritiqueRequest, CritiqueSubject, LlmOracle, Oracle, OracleSettings};
pub use retry::RetryPolicy;
pub use schema::{
    ChunkExtraction, ChunkRef, EntityType, ExtractionFailure, ExtractionTarget, RawEntity,
    RawRelationship,
};

use ingest::Chunk;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Runs the oracle over chunks and turns its answers into raw records.
///
/// Failed calls and undecodable answers are logged and recorded on the
/// chunk's result; only cancellation stops extraction.
pub struct Extractor {
    oracle: Arc<dyn Oracle>,
}

impl Extractor {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    /// Extract one entity type from a chunk.
    pub async fn extract_entities(
        &self,
        chunk: &Chunk,
        index: usize,
        entity_type: EntityType,
    ) -> Result<Vec<RawEntity>, ExtractionError> {
        let response = self
            .oracle
            .extract(chunk, ExtractionTarget::Entities(entity_type))
            .await?;
        let mut result = json::parse_json_object(&response)?;

        let items = match result.remove(entity_type.plural()) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };

        let entities = items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(fields) => Some(RawEntity::new(fields)),
                _ => None,
            })
            .map(|mut entity| {
                entity.set_source_chunk(ChunkRef::Index(index));
                if entity.get_str("supporting_text").is_none() {
                    let name = entity.display_name(entity_type).unwrap_or_default();
                    let year = entity.get_str("year");
                    let text = support::find_supporting_text(&name, year.as_deref(), &chunk.text);
                    entity
                        .fields
                        .insert("supporting_text".to_string(), Value::from(text));
                }
                entity
            })
            .collect::<Vec<_>>();

        debug!(
            chunk = index,
            entity_type = %entity_type,
            count = entities.len(),
            "Extracted entities"
        );
        Ok(entities)
    }

    /// Extract relationships from a chunk. Items that are not relationship
    /// objects are dropped.
    pub async fn extract_relationships(
        &self,
        chunk: &Chunk,
        index: usize,
    ) -> Result<Vec<RawRelationship>, ExtractionError> {
        let response = self
            .oracle
            .extract(chunk, ExtractionTarget::Relationships)
            .await?;
        let mut result = json::parse_json_object(&response)?;

        let items = match result.remove("relationships") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };

        let mut relationships = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<RawRelationship>(item) {
                Ok(mut rel) => {
                    rel.source_chunk = Some(ChunkRef::Index(index));
                    relationships.push(rel);
                }
                Err(e) => debug!(chunk = index, error = %e, "Skipping malformed relationship item"),
            }
        }

        debug!(chunk = index, count = relationships.len(), "Extracted relationships");
        Ok(relationships)
    }

    /// All requested entity types for one chunk. The result is built locally
    /// and only returned whole, so a cancelled chunk contributes nothing.
    pub async fn extract_chunk_entities(
        &self,
        chunk: &Chunk,
        index: usize,
        entity_types: &[EntityType],
    ) -> Result<ChunkExtraction, OracleError> {
        let mut extraction = ChunkExtraction::default();

        for &entity_type in entity_types {
            let target = ExtractionTarget::Entities(entity_type);
            match self.extract_entities(chunk, index, entity_type).await {
                Ok(entities) => {
                    extraction.entities.entry(entity_type).or_default().extend(entities);
                }
                Err(ExtractionError::Oracle(OracleError::Cancelled)) => {
                    return Err(OracleError::Cancelled);
                }
                Err(e) => {
                    record_failure(&mut extraction, index, target, &e);
                    extraction.entities.entry(entity_type).or_default();
                }
            }
        }

        Ok(extraction)
    }

    pub async fn extract_chunk_relationships(
        &self,
        chunk: &Chunk,
        index: usize,
    ) -> Result<ChunkExtraction, OracleError> {
        let mut extraction = ChunkExtraction::default();

        match self.extract_relationships(chunk, index).await {
            Ok(relationships) => extraction.relationships = relationships,
            Err(ExtractionError::Oracle(OracleError::Cancelled)) => {
                return Err(OracleError::Cancelled);
            }
            Err(e) => record_failure(&mut extraction, index, ExtractionTarget::Relationships, &e),
        }

        Ok(extraction)
    }
}

fn record_failure(
    extraction: &mut ChunkExtraction,
    index: usize,
    target: ExtractionTarget,
    err: &ExtractionError,
) {
    match err {
        ExtractionError::Parse(e) => {
            warn!(
                chunk = index,
                target = %target,
                error = %e,
                "Failed to decode extraction response"
            )
        }
        ExtractionError::Oracle(e) => {
            error!(chunk = index, target = %target, error = %e, "Extraction call failed")
        }
    }
    extraction.failures.push(ExtractionFailure {
        chunk: index,
        target: target.to_string(),
        error: err.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Oracle answering extraction calls by target.
    struct FixedOracle {
        answers: HashMap<String, Result<String, ()>>,
    }

    #[async_trait]
    impl Oracle for FixedOracle {
        async fn extract(
            &self,
            _chunk: &Chunk,
            target: ExtractionTarget,
        ) -> Result<String, OracleError> {
            match self.answers.get(&target.to_string()) {
                Some(Ok(text)) => Ok(text.clone()),
                Some(Err(())) => Err(OracleError::EmptyResponse),
                None => Err(OracleError::Cancelled),
            }
        }

        async fn critique(&self, _request: &CritiqueRequest) -> Result<String, OracleError> {
            Err(OracleError::EmptyResponse)
        }
    }

    fn extractor(answers: &[(&str, Result<&str, ()>)]) -> Extractor {
        let answers = answers
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect();
        Extractor::new(Arc::new(FixedOracle { answers }))
    }

    #[tokio::test]
    async fn stamps_provenance_and_supporting_text() {
        let extractor = extractor(&[(
            "actors",
            Ok(r#"```json
{"actors": [
  {"name": "Lancet Commission", "supporting_text": "The Lancet Commission"},
  {"name": "Rockefeller Foundation"},
  "junk"
]}
```"#),
        )]);
        let chunk = Chunk::from_text("The Rockefeller Foundation funded it. Later work followed");

        let actors = extractor
            .extract_entities(&chunk, 3, EntityType::Actor)
            .await
            .unwrap();

        assert_eq!(actors.len(), 2);
        assert_eq!(actors[0].source_chunk(), Some(ChunkRef::Index(3)));
        assert_eq!(actors[0].get_str("supporting_text").as_deref(), Some("The Lancet Commission"));
        assert_eq!(
            actors[1].get_str("supporting_text").as_deref(),
            Some("The Rockefeller Foundation funded it.")
        );
    }

    #[tokio::test]
    async fn failures_are_recorded_not_raised() {
        let extractor = extractor(&[
            ("events", Err(())),
            ("actors", Ok("no json here")),
            ("concepts", Ok(r#"{"concepts": [{"name": "One Health"}]}"#)),
        ]);
        let chunk = Chunk::from_text("One Health.");

        let result = extractor
            .extract_chunk_entities(
                &chunk,
                0,
                &[EntityType::Event, EntityType::Actor, EntityType::Concept],
            )
            .await
            .unwrap();

        assert_eq!(result.failures.len(), 2);
        assert_eq!(result.entities[&EntityType::Concept].len(), 1);
        assert!(result.entities[&EntityType::Event].is_empty());
    }

    #[tokio::test]
    async fn cancellation_discards_the_chunk() {
        let extractor = extractor(&[("events", Ok(r#"{"events": [{"title": "Earth Summit"}]}"#))]);
        let chunk = Chunk::from_text("text");

        let result = extractor
            .extract_chunk_entities(&chunk, 0, &[EntityType::Event, EntityType::Actor])
            .await;

        assert!(matches!(result, Err(OracleError::Cancelled)));
    }

    #[tokio::test]
    async fn relationships_get_chunk_index() {
        let extractor = extractor(&[(
            "relationships",
            Ok(r#"{"relationships": [
                {"source": "A", "source_type": "actor", "target": "B",
                 "target_type": "concept", "relationship_type": "develops"},
                7
            ]}"#),
        )]);

        let result = extractor
            .extract_chunk_relationships(&Chunk::from_text("A develops B."), 5)
            .await
            .unwrap();

        assert_eq!(result.relationships.len(), 1);
        assert_eq!(result.relationships[0].source_chunk, Some(ChunkRef::Index(5)));
    }
}
