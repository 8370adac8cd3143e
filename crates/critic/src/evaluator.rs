use std::sync::Arc;
use tracing::{debug, error, warn};

use extract::json::parse_nested_object;
use extract::{ChunkRef, CritiqueRequest, CritiqueSubject, Oracle, OracleError};
use ingest::Chunk;
use resolve::{Entity, Relationship};

use crate::evaluation::{Evaluation, Subject};

/// Characters of the supporting chunk shown to the critic.
pub const CHUNK_PREVIEW_CHARS: usize = 1000;

/// Locate the chunk a record was extracted from, by position first and
/// then by chunk id.
pub fn find_supporting_chunk<'a>(
    source_chunk: Option<&ChunkRef>,
    chunks: &'a [Chunk],
) -> Option<&'a Chunk> {
    match source_chunk? {
        ChunkRef::Index(index) => chunks.get(*index),
        ChunkRef::Id(id) => chunks
            .iter()
            .find(|chunk| chunk.chunk_id.as_deref() == Some(id.as_str())),
    }
}

/// Scores single entities and relationships through the oracle. Never
/// fails: anything that goes wrong yields [`Evaluation::fallback`].
#[derive(Clone)]
pub struct Critic {
    oracle: Arc<dyn Oracle>,
}

impl Critic {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    pub async fn evaluate_entity(&self, entity: &Entity, chunk: Option<&Chunk>) -> Evaluation {
        let subject = Subject::Entity {
            entity_id: entity.id.clone(),
            entity_type: entity.entity_type(),
        };
        let request = CritiqueRequest {
            subject: CritiqueSubject::Entity {
                entity_type: entity.entity_type(),
                record: entity.to_value(),
            },
            chunk_preview: preview(chunk),
            supporting_text: entity.supporting_text.clone(),
        };
        self.run(subject, request).await
    }

    pub async fn evaluate_relationship(
        &self,
        relationship: &Relationship,
        source: Option<&Entity>,
        target: Option<&Entity>,
        chunk: Option<&Chunk>,
    ) -> Evaluation {
        let subject = Subject::Relationship {
            relationship_id: relationship.id.clone(),
            relationship_type: relationship.relationship_type.clone(),
        };
        let request = CritiqueRequest {
            subject: CritiqueSubject::Relationship {
                record: relationship.to_value(),
                source: source.map(Entity::to_value),
                target: target.map(Entity::to_value),
            },
            chunk_preview: preview(chunk),
            supporting_text: relationship.supporting_text.clone(),
        };
        self.run(subject, request).await
    }

    async fn run(&self, subject: Subject, request: CritiqueRequest) -> Evaluation {
        let response = match self.oracle.critique(&request).await {
            Ok(response) => response,
            Err(OracleError::Cancelled) => {
                debug!(subject = %subject, "Critique cancelled");
                return Evaluation::fallback(subject, "Evaluation cancelled");
            }
            Err(e) => {
                error!(subject = %subject, error = %e, "Error calling critic");
                return Evaluation::fallback(subject, format!("Error calling critic: {e}"));
            }
        };

        match parse_nested_object(&response, "evaluation") {
            Ok(fields) => Evaluation::from_oracle(subject, &fields),
            Err(e) => {
                warn!(subject = %subject, error = %e, "Failed to parse critic response");
                Evaluation::fallback(subject, format!("Failed to parse critic response: {e}"))
            }
        }
    }
}

fn preview(chunk: Option<&Chunk>) -> String {
    chunk
        .map(|c| c.preview(CHUNK_PREVIEW_CHARS))
        .unwrap_or_default()
}
