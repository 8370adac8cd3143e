use serde::{Deserialize, Serialize};

use crate::model::{EntityMap, Relationship, index_by_id};

/// A relationship carrying its endpoints' names and descriptions, for
/// readers that do not want to join against the entity list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRelationship {
    #[serde(flatten)]
    pub relationship: Relationship,
    pub source_name: String,
    #[serde(default)]
    pub source_description: String,
    pub target_name: String,
    #[serde(default)]
    pub target_description: String,
}

/// Attach endpoint names and descriptions. An id with no entity gets
/// `"Unknown"` as its name.
pub fn enrich_relationships(
    relationships: &[Relationship],
    entities: &EntityMap,
) -> Vec<EnrichedRelationship> {
    let by_id = index_by_id(entities);
    let describe = |id: &str| match by_id.get(id) {
        Some(entity) => (
            entity.display_name().to_string(),
            entity.description().unwrap_or_default().to_string(),
        ),
        None => ("Unknown".to_string(), String::new()),
    };

    relationships
        .iter()
        .map(|rel| {
            let (source_name, source_description) = describe(&rel.source_id);
            let (target_name, target_description) = describe(&rel.target_id);
            EnrichedRelationship {
                relationship: rel.clone(),
                source_name,
                source_description,
                target_name,
                target_description,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActorProfile, Entity, EntityDetails};
    use extract::EntityType;

    #[test]
    fn names_endpoints_and_marks_missing_ones() {
        let mut entities = EntityMap::new();
        entities.insert(
            EntityType::Actor,
            vec![Entity::new(
                "a1",
                EntityDetails::Actor(ActorProfile {
                    name: "Thomas Berry".into(),
                    description: Some("Cultural historian".into()),
                    ..Default::default()
                }),
            )],
        );
        let rel = Relationship {
            id: "r1".into(),
            source_id: "a1".into(),
            source_type: EntityType::Actor,
            target_id: "missing".into(),
            target_type: EntityType::Concept,
            relationship_type: "Develops".into(),
            description: String::new(),
            strength: 4,
            supporting_text: String::new(),
            source_chunk: None,
        };

        let enriched = enrich_relationships(&[rel], &entities);

        assert_eq!(enriched[0].source_name, "Thomas Berry");
        assert_eq!(enriched[0].source_description, "Cultural historian");
        assert_eq!(enriched[0].target_name, "Unknown");

        let value = serde_json::to_value(&enriched[0]).unwrap();
        assert_eq!(value["source_id"], "a1");
        assert_eq!(value["target_name"], "Unknown");
    }
}
