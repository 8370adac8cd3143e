use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use critic::{Critic, CriticError, CritiqueOptions, CritiqueReport};
use extract::{ChunkExtraction, EntityType, ExtractionFailure, Extractor, Oracle, OracleError};
use ingest::Chunk;
use resolve::{EntityResolver, KnowledgeGraph, ResolutionReport, resolve_graph};

use crate::config::ConfigError;
use crate::metrics::{Metrics, MetricsSnapshot, Phase, TimedOperation};
use crate::output::{ExtractionStats, OutputSink};
use crate::selection::ChunkSelection;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("pipeline cancelled")]
    Cancelled,
    #[error(transparent)]
    Output(#[from] anyhow::Error),
}

impl From<CriticError> for PipelineError {
    fn from(err: CriticError) -> Self {
        match err {
            CriticError::Cancelled => PipelineError::Cancelled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub entity_types: Vec<EntityType>,
    pub extract_relationships: bool,
    /// Write a resolved entity snapshot after every chunk of phase 1.
    pub update_after_each: bool,
    pub output_dir: Option<PathBuf>,
    pub base_filename: Option<String>,
    pub selection: ChunkSelection,
    /// `None` skips the critic.
    pub critique: Option<CritiqueOptions>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            entity_types: EntityType::ALL.to_vec(),
            extract_relationships: true,
            update_after_each: false,
            output_dir: None,
            base_filename: None,
            selection: ChunkSelection::All,
            critique: Some(CritiqueOptions::default()),
        }
    }
}

impl PipelineOptions {
    /// The snapshot sink, when snapshots are requested. Errors if they are
    /// requested without somewhere to put them.
    pub fn validate(&self) -> Result<Option<OutputSink>, ConfigError> {
        if !self.update_after_each {
            return Ok(None);
        }
        let dir = self.output_dir.as_ref().ok_or(ConfigError::MissingOutputDir)?;
        let base = self.base_filename.as_ref().ok_or(ConfigError::MissingBaseFilename)?;
        Ok(Some(OutputSink::new(dir.clone(), base.clone())))
    }
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub graph: KnowledgeGraph,
    pub resolution: ResolutionReport,
    pub failures: Vec<ExtractionFailure>,
    pub critique: Option<CritiqueReport>,
    pub stats: ExtractionStats,
}

/// Extraction, resolution and critique over a list of chunks.
pub struct Pipeline {
    oracle: Arc<dyn Oracle>,
    extractor: Extractor,
    critic: Critic,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(oracle: Arc<dyn Oracle>, cancel: CancellationToken) -> Self {
        Self {
            extractor: Extractor::new(oracle.clone()),
            critic: Critic::new(oracle.clone()),
            oracle,
            metrics: Metrics::new(),
            cancel,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.oracle.call_stats())
    }

    /// Phase 1 extracts every requested entity type from every selected
    /// chunk, phase 2 the relationships, phase 3 resolves the lot. The
    /// critic then runs over the resolved graph if enabled.
    ///
    /// Each chunk's results are committed only once the chunk is done, so
    /// cancellation never leaves a half-processed chunk behind.
    pub async fn run(
        &self,
        chunks: &[Chunk],
        options: &PipelineOptions,
    ) -> Result<PipelineOutcome, PipelineError> {
        let snapshots = options.validate()?;
        let selected = options.selection.apply(chunks)?;
        let total = selected.len();
        let mut collected = ChunkExtraction::default();

        info!(chunks = total, entity_types = ?options.entity_types, "Phase 1: extracting entities");
        let timer = TimedOperation::start();
        for (position, (index, chunk)) in selected.iter().enumerate() {
            self.check_cancelled()?;
            info!(chunk = index, position = position + 1, total, "Extracting entities");

            let extraction = self
                .extractor
                .extract_chunk_entities(chunk, *index, &options.entity_types)
                .await
                .map_err(cancelled)?;
            self.metrics.record_chunk(extraction.entity_count(), extraction.failures.len());
            collected.absorb(extraction);

            if let Some(sink) = &snapshots {
                self.save_snapshot(sink, &collected, options, total, position + 1).await?;
            }
        }
        self.metrics.record_phase(Phase::Entities, timer.elapsed());

        if options.extract_relationships {
            info!(chunks = total, "Phase 2: extracting relationships");
            let timer = TimedOperation::start();
            for (position, (index, chunk)) in selected.iter().enumerate() {
                self.check_cancelled()?;
                info!(chunk = index, position = position + 1, total, "Extracting relationships");

                let extraction = self
                    .extractor
                    .extract_chunk_relationships(chunk, *index)
                    .await
                    .map_err(cancelled)?;
                self.metrics.record_relationships(
                    extraction.relationships.len(),
                    extraction.failures.len(),
                );
                collected.absorb(extraction);
            }
            self.metrics.record_phase(Phase::Relationships, timer.elapsed());
        }

        info!("Phase 3: resolving entities and relationships");
        let timer = TimedOperation::start();
        let ChunkExtraction {
            entities,
            relationships,
            failures,
        } = collected;
        let (graph, resolution) = resolve_graph(entities, relationships);
        self.metrics.record_phase(Phase::Resolution, timer.elapsed());
        info!(
            entities = graph.entity_count(),
            relationships = graph.relationships.len(),
            synthesized = resolution.synthesized_total(),
            "Resolution complete"
        );
        if !failures.is_empty() {
            warn!(count = failures.len(), "Some extraction calls failed");
        }

        let critique = match &options.critique {
            Some(critique_options) => Some(self.critique(&graph, chunks, critique_options).await?),
            None => None,
        };

        let mut stats = ExtractionStats::for_graph(&graph, &options.entity_types, total, total);
        stats.extraction_failures = failures.clone();
        stats.resolution = Some(resolution.clone());
        stats.metrics = Some(self.metrics());

        Ok(PipelineOutcome {
            graph,
            resolution,
            failures,
            critique,
            stats,
        })
    }

    /// Critique an already resolved graph. `chunks` is the full chunk list
    /// the graph's provenance indices refer to.
    pub async fn critique(
        &self,
        graph: &KnowledgeGraph,
        chunks: &[Chunk],
        options: &CritiqueOptions,
    ) -> Result<CritiqueReport, PipelineError> {
        info!(concurrency = options.concurrency, "Running critic");
        let timer = TimedOperation::start();
        let report = self
            .critic
            .evaluate_all(&graph.entity_map(), &graph.relationships, chunks, options, &self.cancel)
            .await?;
        self.metrics.record_critiqued(
            report.statistics.entities_evaluated + report.statistics.relationships_evaluated,
        );
        self.metrics.record_phase(Phase::Critic, timer.elapsed());
        Ok(report)
    }

    async fn save_snapshot(
        &self,
        sink: &OutputSink,
        collected: &ChunkExtraction,
        options: &PipelineOptions,
        total: usize,
        processed: usize,
    ) -> Result<(), PipelineError> {
        let entities = EntityResolver::new().resolve(collected.entities.clone());
        let graph = KnowledgeGraph::from_parts(entities, Vec::new());

        let mut stats = ExtractionStats::for_graph(&graph, &options.entity_types, total, processed);
        stats.phase = Some("entities_only".to_string());

        let sink = sink.with_base(format!("{}_entities_phase1_{}", sink.base(), processed));
        info!(processed, total, base = %sink.base(), "Saving intermediate entity results");
        sink.save_graph(&graph, &options.entity_types, &stats).await?;
        Ok(())
    }

    fn check_cancelled(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }
}

fn cancelled(_: OracleError) -> PipelineError {
    PipelineError::Cancelled
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use extract::{CritiqueRequest, ExtractionTarget};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers by target; counts calls; cancels the token after `cancel_after` calls.
    struct StubOracle {
        calls: AtomicUsize,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl StubOracle {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                cancel_after: None,
            }
        }
    }

    #[async_trait]
    impl Oracle for StubOracle {
        async fn extract(
            &self,
            chunk: &Chunk,
            target: ExtractionTarget,
        ) -> Result<String, OracleError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((limit, token)) = &self.cancel_after {
                if n > *limit {
                    token.cancel();
                    return Err(OracleError::Cancelled);
                }
            }
            let answer = match target {
                ExtractionTarget::Entities(EntityType::Actor) => {
                    format!(
                        r#"{{"actors": [{{"name": "UNEP", "supporting_text": "{}"}}]}}"#,
                        chunk.text
                    )
                }
                ExtractionTarget::Entities(_) => r#"{"items": []}"#.to_string(),
                ExtractionTarget::Relationships => r#"{"relationships": [
                    {"source_name": "UNEP", "source_type": "actor",
                     "target_name": "Montreal Protocol 1987", "target_type": "event",
                     "relationship_type": "negotiated", "strength": 4}
                ]}"#
                .to_string(),
            };
            Ok(answer)
        }

        async fn critique(&self, _request: &CritiqueRequest) -> Result<String, OracleError> {
            Ok(
                r#"{"evaluation": {"overall_confidence": 4, "extraction_quality": "good"}}"#
                    .to_string(),
            )
        }
    }

    fn chunks() -> Vec<Chunk> {
        vec![Chunk::from_text("First."), Chunk::from_text("Second."), Chunk::from_text("Third.")]
    }

    #[tokio::test]
    async fn snapshots_need_a_destination() {
        let pipeline = Pipeline::new(Arc::new(StubOracle::new()), CancellationToken::new());
        let options = PipelineOptions {
            update_after_each: true,
            base_filename: Some("doc".into()),
            ..PipelineOptions::default()
        };

        let err = pipeline.run(&chunks(), &options).await.unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::MissingOutputDir)));

        let options = PipelineOptions {
            update_after_each: true,
            output_dir: Some("out".into()),
            ..PipelineOptions::default()
        };
        let err = pipeline.run(&chunks(), &options).await.unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::MissingBaseFilename)));
    }

    #[tokio::test]
    async fn three_phases_produce_one_graph() {
        let oracle = Arc::new(StubOracle::new());
        let pipeline = Pipeline::new(oracle.clone(), CancellationToken::new());
        let options = PipelineOptions {
            entity_types: vec![EntityType::Actor, EntityType::Event],
            critique: None,
            ..PipelineOptions::default()
        };

        let outcome = pipeline.run(&chunks(), &options).await.unwrap();

        // 3 chunks x 2 types + 3 relationship calls
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 9);
        assert_eq!(outcome.graph.actors.len(), 1);
        assert_eq!(outcome.graph.events.len(), 1);
        assert!(outcome.graph.events[0].auto_created_from_relationship);
        assert_eq!(outcome.graph.relationships.len(), 1);
        assert!(outcome.failures.is_empty());
        assert!(outcome.critique.is_none());
        assert_eq!(outcome.stats.chunks_processed, 3);
        assert_eq!(outcome.stats.entity_counts[&EntityType::Actor], 1);

        let metrics = pipeline.metrics();
        assert_eq!(metrics.chunks_processed, 3);
        assert_eq!(metrics.entities_extracted, 3);
        assert_eq!(metrics.relationships_extracted, 3);
    }

    #[tokio::test]
    async fn selection_keeps_provenance() {
        let pipeline = Pipeline::new(Arc::new(StubOracle::new()), CancellationToken::new());
        let options = PipelineOptions {
            entity_types: vec![EntityType::Actor],
            extract_relationships: false,
            selection: ChunkSelection::Index(2),
            critique: Some(CritiqueOptions::default()),
            ..PipelineOptions::default()
        };

        let outcome = pipeline.run(&chunks(), &options).await.unwrap();

        let actor = &outcome.graph.actors[0];
        assert_eq!(actor.source_chunk, Some(extract::ChunkRef::Index(2)));
        assert_eq!(actor.supporting_text, "Third.");
        let critique = outcome.critique.unwrap();
        assert_eq!(critique.statistics.entities_evaluated, 1);
        assert!(critique.review_tasks.is_empty());
    }

    #[tokio::test]
    async fn snapshots_are_written_per_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(Arc::new(StubOracle::new()), CancellationToken::new());
        let options = PipelineOptions {
            entity_types: vec![EntityType::Actor],
            extract_relationships: false,
            update_after_each: true,
            output_dir: Some(dir.path().to_path_buf()),
            base_filename: Some("doc".into()),
            critique: None,
            ..PipelineOptions::default()
        };

        pipeline.run(&chunks(), &options).await.unwrap();

        for n in 1..=3 {
            let path = dir.path().join(format!("doc_entities_phase1_{n}_extraction_stats.json"));
            let stats: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
            assert_eq!(stats["chunks_processed"], n);
            assert_eq!(stats["phase"], "entities_only");
            assert_eq!(stats["entity_counts"]["actor"], 1);
        }
    }

    #[tokio::test]
    async fn cancellation_stops_the_run() {
        let token = CancellationToken::new();
        let oracle = Arc::new(StubOracle {
            calls: AtomicUsize::new(0),
            cancel_after: Some((1, token.clone())),
        });
        let pipeline = Pipeline::new(oracle.clone(), token);
        let options = PipelineOptions {
            entity_types: vec![EntityType::Actor],
            ..PipelineOptions::default()
        };

        let err = pipeline.run(&chunks(), &options).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
    }
}
