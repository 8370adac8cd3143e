use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::evaluation::{Evaluation, Issue, Quality, Subject};

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;

/// One item of human triage work, derived from a flagged evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewTask {
    pub id: String,
    #[serde(flatten)]
    pub subject: Subject,
    pub priority: u8,
    pub reason: String,
    pub confidence: u8,
    pub quality: Quality,
    #[serde(default)]
    pub issues: Vec<Issue>,
    pub created_at: DateTime<Utc>,
}

/// `(6 - confidence) + quality bonus + high-severity issue count`, clamped
/// to `[MIN_PRIORITY, MAX_PRIORITY]`.
pub fn priority(evaluation: &Evaluation) -> u8 {
    let raw = 6 - i32::from(evaluation.overall_confidence)
        + evaluation.extraction_quality.priority_bonus()
        + evaluation.high_severity_issues() as i32;
    raw.clamp(i32::from(MIN_PRIORITY), i32::from(MAX_PRIORITY)) as u8
}

/// Turn flagged evaluations into tasks, highest priority first. Equal
/// priorities keep input order.
pub fn schedule<'a>(evaluations: impl IntoIterator<Item = &'a Evaluation>) -> Vec<ReviewTask> {
    let created_at = Utc::now();
    let mut tasks: Vec<ReviewTask> = evaluations
        .into_iter()
        .filter(|evaluation| evaluation.human_review_recommended)
        .map(|evaluation| ReviewTask {
            id: Uuid::new_v4().to_string(),
            subject: evaluation.subject.clone(),
            priority: priority(evaluation),
            reason: if evaluation.human_review_reason.is_empty() {
                "Quality concerns".to_string()
            } else {
                evaluation.human_review_reason.clone()
            },
            confidence: evaluation.overall_confidence,
            quality: evaluation.extraction_quality,
            issues: evaluation.issues_identified.clone(),
            created_at,
        })
        .collect();

    // sort_by is stable
    tasks.sort_by(|a, b| b.priority.cmp(&a.priority));
    tasks
}
