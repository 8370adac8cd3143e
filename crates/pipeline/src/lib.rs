//! Orchestration for the `kgraph` binary: configuration, logging, metrics,
//! the extraction/resolution/critique pipeline, JSON output and the review
//! file server.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod runner;
pub mod selection;
pub mod server;

pub use config::{AppConfig, ConfigError, OperationMode, Provider};
pub use metrics::{Metrics, MetricsSnapshot};
pub use output::{ExtractionStats, OutputSink};
pub use runner::{Pipeline, PipelineError, PipelineOptions, PipelineOutcome};
pub use selection::ChunkSelection;

use std::path::Path;

/// Output file prefix for a chunk file: its stem without a trailing `_chunks`.
pub fn base_filename(chunks_file: &Path) -> String {
    let stem = chunks_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    match stem.strip_suffix("_chunks") {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_filename_drops_chunks_suffix() {
        assert_eq!(base_filename(Path::new("data/report_chunks.json")), "report");
        assert_eq!(base_filename(Path::new("report.json")), "report");
        assert_eq!(base_filename(Path::new("_chunks.json")), "_chunks");
    }
}
