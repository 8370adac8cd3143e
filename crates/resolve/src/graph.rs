use serde::{Deserialize, Serialize};

use extract::EntityType;

use crate::model::{Entity, EntityMap, Relationship, entity_count};

/// A resolved graph as written to disk: one list per entity type plus the
/// deduplicated relationships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    #[serde(default)]
    pub events: Vec<Entity>,
    #[serde(default)]
    pub actors: Vec<Entity>,
    #[serde(default)]
    pub concepts: Vec<Entity>,
    #[serde(default)]
    pub publications: Vec<Entity>,
    #[serde(default)]
    pub locations: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl KnowledgeGraph {
    pub fn from_parts(mut entities: EntityMap, relationships: Vec<Relationship>) -> Self {
        let mut take = |entity_type| entities.remove(&entity_type).unwrap_or_default();
        Self {
            events: take(EntityType::Event),
            actors: take(EntityType::Actor),
            concepts: take(EntityType::Concept),
            publications: take(EntityType::Publication),
            locations: take(EntityType::Location),
            relationships,
        }
    }

    pub fn entities_of(&self, entity_type: EntityType) -> &[Entity] {
        match entity_type {
            EntityType::Event => &self.events,
            EntityType::Actor => &self.actors,
            EntityType::Concept => &self.concepts,
            EntityType::Publication => &self.publications,
            EntityType::Location => &self.locations,
        }
    }

    /// Entities grouped by type; types with no entities are left out.
    pub fn entity_map(&self) -> EntityMap {
        EntityType::ALL
            .iter()
            .filter(|t| !self.entities_of(**t).is_empty())
            .map(|t| (*t, self.entities_of(*t).to_vec()))
            .collect()
    }

    pub fn entity_count(&self) -> usize {
        entity_count(&self.entity_map())
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
            && EntityType::ALL.iter().all(|t| self.entities_of(*t).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityDetails, LocationProfile};

    #[test]
    fn parts_round_trip_through_json() {
        let mut entities = EntityMap::new();
        entities.insert(
            EntityType::Location,
            vec![Entity::new(
                "l1",
                EntityDetails::Location(LocationProfile {
                    name: "Whanganui River".into(),
                    country: Some("New Zealand".into()),
                    ..Default::default()
                }),
            )],
        );

        let graph = KnowledgeGraph::from_parts(entities.clone(), Vec::new());
        assert_eq!(graph.entity_map(), entities);
        assert_eq!(graph.entity_count(), 1);

        let json = serde_json::to_string(&graph).unwrap();
        let back: KnowledgeGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, graph);
        assert_eq!(back.locations[0].display_name(), "Whanganui River");
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let graph: KnowledgeGraph = serde_json::from_str(r#"{"relationships": []}"#).unwrap();
        assert!(graph.is_empty());
    }
}
