//! Quality review of a resolved knowledge graph: per-item critique by the
//! oracle, a ranked human review queue and aggregate statistics.

pub mod evaluation;
pub mod evaluator;
pub mod scheduler;
pub mod stats;

pub use evaluation::{Evaluation, Issue, Quality, Rubric, Subject};
pub use evaluator::{CHUNK_PREVIEW_CHARS, Critic, find_supporting_chunk};
pub use scheduler::{ReviewTask, priority, schedule};
pub use stats::{
    CritiqueStatistics, GroupStatistics, OverallAssessment, QualityDistribution, assess,
};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::info;

use extract::EntityType;
use ingest::Chunk;
use resolve::{Entity, EntityMap, Relationship, index_by_id};

#[derive(Debug, thiserror::Error)]
pub enum CriticError {
    #[error("critique cancelled")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CritiqueOptions {
    /// Skip entities synthesized from relationships.
    pub exclude_auto_created: bool,
    /// Oracle calls in flight at once.
    pub concurrency: usize,
}

impl Default for CritiqueOptions {
    fn default() -> Self {
        Self {
            exclude_auto_created: true,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CritiqueReport {
    pub entity_evaluations: BTreeMap<EntityType, Vec<Evaluation>>,
    pub relationship_evaluations: Vec<Evaluation>,
    pub overall_assessment: OverallAssessment,
    pub review_tasks: Vec<ReviewTask>,
    pub statistics: CritiqueStatistics,
}

impl Critic {
    /// Evaluate every entity (by type) and then every relationship. Results
    /// keep input order whatever the concurrency. Cancellation discards the
    /// whole pass.
    pub async fn evaluate_all(
        &self,
        entities: &EntityMap,
        relationships: &[Relationship],
        chunks: &[Chunk],
        options: &CritiqueOptions,
        cancel: &CancellationToken,
    ) -> Result<CritiqueReport, CriticError> {
        let width = options.concurrency.max(1);

        let mut entity_evaluations = BTreeMap::new();
        for (entity_type, list) in entities {
            let selected: Vec<&Entity> = list
                .iter()
                .filter(|e| !(options.exclude_auto_created && e.auto_created_from_relationship))
                .collect();
            if selected.len() < list.len() {
                info!(
                    entity_type = %entity_type,
                    evaluated = selected.len(),
                    total = list.len(),
                    "Excluding auto-created entities"
                );
            }
            if selected.is_empty() {
                continue;
            }

            info!(entity_type = %entity_type, count = selected.len(), "Evaluating entities");
            let evaluations = self
                .guarded(
                    cancel,
                    stream::iter(selected)
                        .map(|entity| {
                            let chunk = find_supporting_chunk(entity.source_chunk.as_ref(), chunks);
                            self.evaluate_entity(entity, chunk)
                        })
                        .buffered(width)
                        .collect::<Vec<_>>(),
                )
                .await?;
            entity_evaluations.insert(*entity_type, evaluations);
        }

        let by_id = index_by_id(entities);
        info!(count = relationships.len(), "Evaluating relationships");
        let relationship_evaluations = self
            .guarded(
                cancel,
                stream::iter(relationships)
                    .map(|rel| {
                        let source = by_id.get(rel.source_id.as_str()).copied();
                        let target = by_id.get(rel.target_id.as_str()).copied();
                        let chunk = find_supporting_chunk(rel.source_chunk.as_ref(), chunks);
                        self.evaluate_relationship(rel, source, target, chunk)
                    })
                    .buffered(width)
                    .collect::<Vec<_>>(),
            )
            .await?;

        let overall_assessment = assess(&entity_evaluations, &relationship_evaluations);
        let review_tasks = schedule(
            entity_evaluations
                .values()
                .flatten()
                .chain(&relationship_evaluations),
        );
        let statistics =
            CritiqueStatistics::collect(&entity_evaluations, &relationship_evaluations);

        info!(
            entities = statistics.entities_evaluated,
            relationships = statistics.relationships_evaluated,
            review_tasks = review_tasks.len(),
            confidence = overall_assessment.overall_confidence,
            "Critique complete"
        );

        Ok(CritiqueReport {
            entity_evaluations,
            relationship_evaluations,
            overall_assessment,
            review_tasks,
            statistics,
        })
    }

    async fn guarded<T>(
        &self,
        cancel: &CancellationToken,
        work: impl std::future::Future<Output = T>,
    ) -> Result<T, CriticError> {
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(CriticError::Cancelled),
            result = work => result,
        };
        // Calls cut short by cancellation came back as fallbacks.
        if cancel.is_cancelled() {
            return Err(CriticError::Cancelled);
        }
        Ok(result)
    }
}
