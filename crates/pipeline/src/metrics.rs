use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use extract::CallStats;

/// Run counters shared by the pipeline phases.
pub struct Metrics {
    // Counts
    chunks_processed: AtomicUsize,
    entities_extracted: AtomicUsize,
    relationships_extracted: AtomicUsize,
    extraction_failures: AtomicUsize,
    items_critiqued: AtomicUsize,

    // Timing (in microseconds)
    entity_phase_us: AtomicU64,
    relationship_phase_us: AtomicU64,
    resolution_phase_us: AtomicU64,
    critic_phase_us: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub enum Phase {
    Entities,
    Relationships,
    Resolution,
    Critic,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            chunks_processed: AtomicUsize::new(0),
            entities_extracted: AtomicUsize::new(0),
            relationships_extracted: AtomicUsize::new(0),
            extraction_failures: AtomicUsize::new(0),
            items_critiqued: AtomicUsize::new(0),
            entity_phase_us: AtomicU64::new(0),
            relationship_phase_us: AtomicU64::new(0),
            resolution_phase_us: AtomicU64::new(0),
            critic_phase_us: AtomicU64::new(0),
        })
    }

    pub fn record_chunk(&self, entities: usize, failures: usize) {
        self.chunks_processed.fetch_add(1, Ordering::Relaxed);
        self.entities_extracted.fetch_add(entities, Ordering::Relaxed);
        self.extraction_failures.fetch_add(failures, Ordering::Relaxed);
    }

    pub fn record_relationships(&self, relationships: usize, failures: usize) {
        self.relationships_extracted.fetch_add(relationships, Ordering::Relaxed);
        self.extraction_failures.fetch_add(failures, Ordering::Relaxed);
    }

    pub fn record_critiqued(&self, items: usize) {
        self.items_critiqued.fetch_add(items, Ordering::Relaxed);
    }

    pub fn record_phase(&self, phase: Phase, duration: Duration) {
        let slot = match phase {
            Phase::Entities => &self.entity_phase_us,
            Phase::Relationships => &self.relationship_phase_us,
            Phase::Resolution => &self.resolution_phase_us,
            Phase::Critic => &self.critic_phase_us,
        };
        slot.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, oracle: CallStats) -> MetricsSnapshot {
        MetricsSnapshot {
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
            entities_extracted: self.entities_extracted.load(Ordering::Relaxed),
            relationships_extracted: self.relationships_extracted.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            items_critiqued: self.items_critiqued.load(Ordering::Relaxed),
            entity_phase_ms: as_ms(&self.entity_phase_us),
            relationship_phase_ms: as_ms(&self.relationship_phase_us),
            resolution_phase_ms: as_ms(&self.resolution_phase_us),
            critic_phase_ms: as_ms(&self.critic_phase_us),
            oracle,
        }
    }
}

fn as_ms(total_us: &AtomicU64) -> f64 {
    total_us.load(Ordering::Relaxed) as f64 / 1000.0
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub chunks_processed: usize,
    pub entities_extracted: usize,
    pub relationships_extracted: usize,
    pub extraction_failures: usize,
    pub items_critiqued: usize,
    pub entity_phase_ms: f64,
    pub relationship_phase_ms: f64,
    pub resolution_phase_ms: f64,
    pub critic_phase_ms: f64,
    pub oracle: CallStats,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
