use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use critic::{CritiqueReport, CritiqueStatistics, OverallAssessment};
use extract::{EntityType, ExtractionFailure};
use ingest::Chunk;
use resolve::{KnowledgeGraph, ResolutionReport, enrich_relationships};

use crate::metrics::MetricsSnapshot;

/// Counters written next to the graph as `<base>_extraction_stats.json`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionStats {
    pub total_chunks: usize,
    pub chunks_processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    pub entity_counts: BTreeMap<EntityType, usize>,
    pub relationship_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extraction_failures: Vec<ExtractionFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsSnapshot>,
}

impl ExtractionStats {
    pub fn for_graph(
        graph: &KnowledgeGraph,
        entity_types: &[EntityType],
        total_chunks: usize,
        chunks_processed: usize,
    ) -> Self {
        Self {
            total_chunks,
            chunks_processed,
            entity_counts: output_types(graph, entity_types)
                .into_iter()
                .map(|t| (t, graph.entities_of(t).len()))
                .collect(),
            relationship_count: graph.relationships.len(),
            ..Self::default()
        }
    }
}

/// Requested types plus any type that ended up with entities (stubs made
/// from relationships can introduce types nobody asked for).
pub fn output_types(graph: &KnowledgeGraph, requested: &[EntityType]) -> Vec<EntityType> {
    EntityType::ALL
        .into_iter()
        .filter(|t| requested.contains(t) || !graph.entities_of(*t).is_empty())
        .collect()
}

#[derive(Serialize)]
struct QualityReport<'a> {
    overall_assessment: &'a OverallAssessment,
    statistics: &'a CritiqueStatistics,
}

/// Writes run results as pretty JSON files named `<base>_<kind>.json`.
#[derive(Debug, Clone)]
pub struct OutputSink {
    dir: PathBuf,
    base: String,
}

impl OutputSink {
    pub fn new(dir: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base: base.into(),
        }
    }

    /// Same directory, different file prefix.
    pub fn with_base(&self, base: impl Into<String>) -> Self {
        Self::new(self.dir.clone(), base)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn path(&self, kind: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.json", self.base, kind))
    }

    async fn write_json<T: Serialize + ?Sized>(&self, kind: &str, value: &T) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create output directory {}", self.dir.display()))?;

        let path = self.path(kind);
        let body = serde_json::to_vec_pretty(value)
            .with_context(|| format!("Failed to serialize {kind}"))?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// `<base>_chunks.json`, loadable by `ingest::load_chunks`.
    pub async fn save_chunks(&self, chunks: &[Chunk]) -> Result<PathBuf> {
        let path = self
            .write_json("chunks", &serde_json::json!({ "chunks": chunks }))
            .await?;
        info!(path = %path.display(), chunks = chunks.len(), "Saved chunks");
        Ok(path)
    }

    /// One file per entity type, the enriched relationships, the combined
    /// graph and the stats.
    pub async fn save_graph(
        &self,
        graph: &KnowledgeGraph,
        entity_types: &[EntityType],
        stats: &ExtractionStats,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        for entity_type in output_types(graph, entity_types) {
            let mut body = Map::new();
            body.insert(
                entity_type.plural().to_string(),
                serde_json::to_value(graph.entities_of(entity_type))?,
            );
            written.push(self.write_json(entity_type.plural(), &Value::Object(body)).await?);
        }

        let enriched = enrich_relationships(&graph.relationships, &graph.entity_map());
        written.push(
            self.write_json("relationships", &serde_json::json!({ "relationships": enriched }))
                .await?,
        );
        written.push(self.write_json("knowledge_graph", graph).await?);
        written.push(self.write_json("extraction_stats", stats).await?);

        info!(
            dir = %self.dir.display(),
            base = %self.base,
            files = written.len(),
            "Saved extraction results"
        );
        Ok(written)
    }

    /// The full critique, the review queue alone, and the quality summary.
    pub async fn save_critique(&self, report: &CritiqueReport) -> Result<Vec<PathBuf>> {
        let written = vec![
            self.write_json("critic_evaluation", report).await?,
            self.write_json(
                "review_tasks",
                &serde_json::json!({ "review_tasks": report.review_tasks }),
            )
            .await?,
            self.write_json(
                "quality_report",
                &QualityReport {
                    overall_assessment: &report.overall_assessment,
                    statistics: &report.statistics,
                },
            )
            .await?,
        ];

        info!(
            dir = %self.dir.display(),
            review_tasks = report.review_tasks.len(),
            "Saved critic results"
        );
        Ok(written)
    }
}
