use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use extract::EntityType;
use extract::coerce::{as_scale, as_string, as_string_list};

/// Categorical verdict on one extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Excellent,
    Good,
    Fair,
    #[default]
    Poor,
    /// A label outside the four above.
    #[serde(other)]
    Unrated,
}

impl Quality {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "excellent" => Quality::Excellent,
            "good" => Quality::Good,
            "fair" => Quality::Fair,
            "poor" => Quality::Poor,
            _ => Quality::Unrated,
        }
    }

    /// Adjustment applied to review priority.
    pub fn priority_bonus(&self) -> i32 {
        match self {
            Quality::Poor => 3,
            Quality::Fair => 1,
            Quality::Good | Quality::Unrated => 0,
            Quality::Excellent => -1,
        }
    }
}

/// The rubric dimensions each kind of subject is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rubric {
    Entity,
    Relationship,
}

impl Rubric {
    pub fn dimensions(&self) -> &'static [&'static str] {
        match self {
            Rubric::Entity => &[
                "evidence",
                "accuracy",
                "completeness",
                "relevance",
                "supporting_text",
                "consistency",
            ],
            Rubric::Relationship => &[
                "evidence",
                "entity_accuracy",
                "relationship_type",
                "direction",
                "strength",
                "relevance",
                "entity_existence",
            ],
        }
    }
}

/// What an evaluation or review task is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subject_kind", rename_all = "snake_case")]
pub enum Subject {
    Entity {
        entity_id: String,
        entity_type: EntityType,
    },
    Relationship {
        relationship_id: String,
        #[serde(default)]
        relationship_type: String,
    },
}

impl Subject {
    pub fn id(&self) -> &str {
        match self {
            Subject::Entity { entity_id, .. } => entity_id,
            Subject::Relationship { relationship_id, .. } => relationship_id,
        }
    }

    pub fn rubric(&self) -> Rubric {
        match self {
            Subject::Entity { .. } => Rubric::Entity,
            Subject::Relationship { .. } => Rubric::Relationship,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Entity { entity_id, entity_type } => write!(f, "{entity_type} {entity_id}"),
            Subject::Relationship { relationship_id, .. } => {
                write!(f, "relationship {relationship_id}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub issue_type: String,
    #[serde(default)]
    pub description: String,
    /// 1 (minor) to 5 (critical)
    pub severity: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_correction: Option<String>,
}

impl Issue {
    fn from_value(value: &Value) -> Option<Self> {
        let fields = value.as_object()?;
        Some(Self {
            issue_type: fields
                .get("issue_type")
                .and_then(as_string)
                .unwrap_or_else(|| "unspecified".to_string()),
            description: fields.get("description").and_then(as_string).unwrap_or_default(),
            severity: fields.get("severity").and_then(as_scale).unwrap_or(1),
            suggested_correction: fields.get("suggested_correction").and_then(as_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(flatten)]
    pub subject: Subject,
    /// Rubric dimension -> 1-5 score.
    #[serde(default)]
    pub scores: BTreeMap<String, u8>,
    pub overall_confidence: u8,
    pub extraction_quality: Quality,
    #[serde(default)]
    pub issues_identified: Vec<Issue>,
    #[serde(default)]
    pub strengths: Vec<String>,
    pub human_review_recommended: bool,
    #[serde(default)]
    pub human_review_reason: String,
    #[serde(default)]
    pub confidence_explanation: String,
}

impl Evaluation {
    /// Read the oracle's `evaluation` object. Missing or malformed values
    /// take the most cautious default.
    pub fn from_oracle(subject: Subject, fields: &Map<String, Value>) -> Self {
        let scores = subject
            .rubric()
            .dimensions()
            .iter()
            .filter_map(|dimension| {
                let score = fields.get(&format!("{dimension}_score")).and_then(as_scale)?;
                Some((dimension.to_string(), score))
            })
            .collect();

        let issues_identified = match fields.get("issues_identified") {
            Some(Value::Array(items)) => items.iter().filter_map(Issue::from_value).collect(),
            _ => Vec::new(),
        };

        let human_review_recommended = match fields.get("human_review_recommended") {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        };

        Self {
            subject,
            scores,
            overall_confidence: fields.get("overall_confidence").and_then(as_scale).unwrap_or(1),
            extraction_quality: fields
                .get("extraction_quality")
                .and_then(as_string)
                .map(|label| Quality::parse(&label))
                .unwrap_or_default(),
            issues_identified,
            strengths: fields.get("strengths").map(as_string_list).unwrap_or_default(),
            human_review_recommended,
            human_review_reason: fields
                .get("human_review_reason")
                .and_then(as_string)
                .unwrap_or_default(),
            confidence_explanation: fields
                .get("confidence_explanation")
                .and_then(as_string)
                .unwrap_or_default(),
        }
    }

    /// Stand-in used whenever the oracle could not produce a usable answer.
    pub fn fallback(subject: Subject, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let scores = subject
            .rubric()
            .dimensions()
            .iter()
            .map(|dimension| (dimension.to_string(), 1))
            .collect();

        Self {
            subject,
            scores,
            overall_confidence: 1,
            extraction_quality: Quality::Poor,
            issues_identified: vec![Issue {
                issue_type: "system".to_string(),
                description: reason.clone(),
                severity: 5,
                suggested_correction: Some("Manual review required".to_string()),
            }],
            strengths: Vec::new(),
            human_review_recommended: true,
            human_review_reason: reason,
            confidence_explanation: "System error during evaluation".to_string(),
        }
    }

    pub fn high_severity_issues(&self) -> usize {
        self.issues_identified
            .iter()
            .filter(|issue| issue.severity >= 4)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn actor() -> Subject {
        Subject::Entity {
            entity_id: "a1".into(),
            entity_type: EntityType::Actor,
        }
    }

    #[test]
    fn reads_lenient_oracle_fields() {
        let fields = json!({
            "evidence_score": "4",
            "accuracy_score": 7,
            "direction_score": 2,
            "overall_confidence": 4,
            "extraction_quality": "Good",
            "issues_identified": [
                {"issue_type": "completeness", "description": "No country", "severity": 2},
                "not an issue"
            ],
            "strengths": "Clear evidence",
            "human_review_recommended": "false"
        });
        let Value::Object(fields) = fields else {
            unreachable!()
        };

        let evaluation = Evaluation::from_oracle(actor(), &fields);

        assert_eq!(evaluation.scores.get("evidence"), Some(&4));
        assert_eq!(evaluation.scores.get("accuracy"), Some(&5));
        assert!(!evaluation.scores.contains_key("direction"));
        assert_eq!(evaluation.extraction_quality, Quality::Good);
        assert_eq!(evaluation.issues_identified.len(), 1);
        assert_eq!(evaluation.strengths, vec!["Clear evidence"]);
        assert!(!evaluation.human_review_recommended);
    }

    #[test]
    fn missing_fields_are_cautious() {
        let evaluation = Evaluation::from_oracle(actor(), &Map::new());
        assert_eq!(evaluation.overall_confidence, 1);
        assert_eq!(evaluation.extraction_quality, Quality::Poor);
        assert!(evaluation.scores.is_empty());
    }

    #[test]
    fn fallback_scores_every_dimension_one() {
        let subject = Subject::Relationship {
            relationship_id: "r1".into(),
            relationship_type: "Funds".into(),
        };
        let evaluation = Evaluation::fallback(subject, "Error calling critic: timed out");

        assert_eq!(evaluation.scores.len(), 7);
        assert!(evaluation.scores.values().all(|s| *s == 1));
        assert_eq!(evaluation.extraction_quality, Quality::Poor);
        assert!(evaluation.human_review_recommended);
        assert_eq!(evaluation.issues_identified[0].issue_type, "system");
        assert_eq!(evaluation.issues_identified[0].severity, 5);
        assert_eq!(evaluation.human_review_reason, "Error calling critic: timed out");
    }

    #[test]
    fn serialized_evaluation_round_trips() {
        let evaluation = Evaluation::fallback(actor(), "Failed to parse critic response");
        let value = serde_json::to_value(&evaluation).unwrap();

        assert_eq!(value["subject_kind"], "entity");
        assert_eq!(value["entity_type"], "actor");
        assert_eq!(value["extraction_quality"], "poor");

        let back: Evaluation = serde_json::from_value(value).unwrap();
        assert_eq!(back, evaluation);
    }

    #[test]
    fn unknown_quality_labels_are_unrated() {
        assert_eq!(Quality::parse("mediocre"), Quality::Unrated);
        assert_eq!(Quality::parse(" EXCELLENT "), Quality::Excellent);
        assert_eq!(Quality::Unrated.priority_bonus(), 0);
    }
}
