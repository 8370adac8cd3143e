use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use extract::EntityType;

use crate::evaluation::{Evaluation, Quality};

const LOW_OVERALL_CONFIDENCE: f64 = 3.0;
const LOW_GROUP_CONFIDENCE: f64 = 2.5;
const HIGH_POOR_RATIO: f64 = 0.3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityDistribution {
    pub excellent: usize,
    pub good: usize,
    pub fair: usize,
    pub poor: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupStatistics {
    pub count: usize,
    pub avg_confidence: f64,
    pub quality_distribution: QualityDistribution,
}

impl GroupStatistics {
    pub fn from_evaluations(evaluations: &[Evaluation]) -> Self {
        let mut distribution = QualityDistribution::default();
        for evaluation in evaluations {
            match evaluation.extraction_quality {
                Quality::Excellent => distribution.excellent += 1,
                Quality::Good => distribution.good += 1,
                Quality::Fair => distribution.fair += 1,
                Quality::Poor => distribution.poor += 1,
                Quality::Unrated => {}
            }
        }

        let count = evaluations.len();
        let avg_confidence = if count == 0 {
            0.0
        } else {
            confidence_sum(evaluations) / count as f64
        };

        Self {
            count,
            avg_confidence,
            quality_distribution: distribution,
        }
    }

    pub fn poor_ratio(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.quality_distribution.poor as f64 / self.count as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub total_items_evaluated: usize,
    pub high_quality_items: usize,
    pub items_needing_review: usize,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallAssessment {
    pub entity_statistics: BTreeMap<EntityType, GroupStatistics>,
    pub relationship_statistics: GroupStatistics,
    pub overall_confidence: f64,
    pub quality_summary: QualitySummary,
    pub recommendations: Vec<String>,
}

/// Flat counters for the run summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CritiqueStatistics {
    pub entities_evaluated: usize,
    pub relationships_evaluated: usize,
    pub entities_needing_review: usize,
    pub relationships_needing_review: usize,
    pub high_quality_entities: usize,
    pub high_quality_relationships: usize,
}

impl CritiqueStatistics {
    pub fn collect(
        entity_evaluations: &BTreeMap<EntityType, Vec<Evaluation>>,
        relationship_evaluations: &[Evaluation],
    ) -> Self {
        let entities = || entity_evaluations.values().flatten();
        Self {
            entities_evaluated: entities().count(),
            relationships_evaluated: relationship_evaluations.len(),
            entities_needing_review: entities().filter(|e| e.human_review_recommended).count(),
            relationships_needing_review: relationship_evaluations
                .iter()
                .filter(|e| e.human_review_recommended)
                .count(),
            high_quality_entities: entities()
                .filter(|e| e.extraction_quality == Quality::Excellent)
                .count(),
            high_quality_relationships: relationship_evaluations
                .iter()
                .filter(|e| e.extraction_quality == Quality::Excellent)
                .count(),
        }
    }
}

fn confidence_sum(evaluations: &[Evaluation]) -> f64 {
    evaluations
        .iter()
        .map(|e| f64::from(e.overall_confidence))
        .sum()
}

pub fn assess(
    entity_evaluations: &BTreeMap<EntityType, Vec<Evaluation>>,
    relationship_evaluations: &[Evaluation],
) -> OverallAssessment {
    let entity_statistics: BTreeMap<EntityType, GroupStatistics> = entity_evaluations
        .iter()
        .filter(|(_, evaluations)| !evaluations.is_empty())
        .map(|(entity_type, evaluations)| {
            (*entity_type, GroupStatistics::from_evaluations(evaluations))
        })
        .collect();
    let relationship_statistics = GroupStatistics::from_evaluations(relationship_evaluations);

    let all = || entity_evaluations.values().flatten().chain(relationship_evaluations);
    let total_items = all().count();
    let overall_confidence = if total_items == 0 {
        0.0
    } else {
        all().map(|e| f64::from(e.overall_confidence)).sum::<f64>() / total_items as f64
    };

    let quality_summary = QualitySummary {
        total_items_evaluated: total_items,
        high_quality_items: all()
            .filter(|e| e.extraction_quality == Quality::Excellent)
            .count(),
        items_needing_review: all().filter(|e| e.human_review_recommended).count(),
        avg_confidence: overall_confidence,
    };

    let recommendations =
        recommendations(&entity_statistics, &relationship_statistics, overall_confidence);

    OverallAssessment {
        entity_statistics,
        relationship_statistics,
        overall_confidence,
        quality_summary,
        recommendations,
    }
}

/// Fixed-threshold advice for the operator. Relationship advice is only
/// given when relationships were evaluated.
pub fn recommendations(
    entity_statistics: &BTreeMap<EntityType, GroupStatistics>,
    relationship_statistics: &GroupStatistics,
    overall_confidence: f64,
) -> Vec<String> {
    let mut advice = Vec::new();

    if overall_confidence < LOW_OVERALL_CONFIDENCE {
        advice.push(
            "Overall extraction quality is low. Consider reviewing extraction prompts and methodology."
                .to_string(),
        );
    }

    if relationship_statistics.count > 0
        && relationship_statistics.avg_confidence < LOW_GROUP_CONFIDENCE
    {
        advice.push(
            "Relationship extraction quality is particularly low. Review relationship extraction criteria."
                .to_string(),
        );
    }

    for (entity_type, stats) in entity_statistics {
        if stats.avg_confidence < LOW_GROUP_CONFIDENCE {
            advice.push(format!(
                "{} entity extraction needs improvement.",
                title_case(entity_type.as_str())
            ));
        }
        let poor_ratio = stats.poor_ratio();
        if poor_ratio > HIGH_POOR_RATIO {
            advice.push(format!(
                "High proportion of poor quality {entity_type} entities ({:.1}%). Review extraction criteria.",
                poor_ratio * 100.0
            ));
        }
    }

    if advice.is_empty() {
        advice.push(
            "Extraction quality is acceptable. Consider spot-checking flagged items.".to_string(),
        );
    }
    advice
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
