use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};
use uuid::Uuid;

use extract::{EntityType, RawEntity};

use crate::merge::merge_into;
use crate::model::{Entity, EntityMap};
use crate::normalizer::normalize;

/// Collapses raw extractions of the same thing into one canonical entity
/// per dedup key.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityResolver;

impl EntityResolver {
    pub fn new() -> Self {
        Self
    }

    /// Normalized display name, with `_<year>` appended for events that
    /// carry one. `None` when the name normalizes to nothing.
    pub fn dedup_key(entity: &Entity) -> Option<String> {
        let name = normalize(entity.display_name());
        if name.is_empty() {
            return None;
        }
        match (entity.entity_type(), entity.year()) {
            (EntityType::Event, Some(year)) => Some(format!("{name}_{year}")),
            _ => Some(name),
        }
    }

    pub fn resolve(&self, raw: BTreeMap<EntityType, Vec<RawEntity>>) -> EntityMap {
        raw.into_iter()
            .map(|(entity_type, records)| {
                let entities = records
                    .into_iter()
                    .map(|record| Entity::from_raw(entity_type, record))
                    .collect();
                (entity_type, self.resolve_type(entity_type, entities))
            })
            .collect()
    }

    /// Merge one type's entities by key, keeping first-seen order. The first
    /// record for a key keeps its id, or is assigned a fresh one.
    pub fn resolve_type(&self, entity_type: EntityType, entities: Vec<Entity>) -> Vec<Entity> {
        let total = entities.len();
        let mut canonical: Vec<Entity> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut dropped = 0usize;

        for mut entity in entities {
            let Some(key) = Self::dedup_key(&entity) else {
                dropped += 1;
                continue;
            };

            match positions.get(&key) {
                Some(&position) => {
                    debug!(key = %key, entity_type = %entity_type, "Merging duplicate entity");
                    merge_into(&mut canonical[position], entity);
                }
                None => {
                    if entity.id.trim().is_empty() {
                        entity.id = Uuid::new_v4().to_string();
                    }
                    positions.insert(key, canonical.len());
                    canonical.push(entity);
                }
            }
        }

        info!(
            entity_type = %entity_type,
            raw = total,
            canonical = canonical.len(),
            dropped,
            "Resolved entities"
        );
        canonical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn raw(value: Value) -> RawEntity {
        match value {
            Value::Object(fields) => RawEntity::new(fields),
            _ => RawEntity::default(),
        }
    }

    fn resolve(entity_type: EntityType, records: Vec<Value>) -> Vec<Entity> {
        let mut input = BTreeMap::new();
        input.insert(entity_type, records.into_iter().map(raw).collect());
        EntityResolver::new()
            .resolve(input)
            .remove(&entity_type)
            .unwrap_or_default()
    }

    #[test]
    fn abbreviation_and_long_form_stay_separate() {
        let actors = resolve(
            EntityType::Actor,
            vec![
                json!({"name": "UNEP"}),
                json!({"name": "United Nations Environment Programme"}),
            ],
        );
        assert_eq!(actors.len(), 2);
    }

    #[test]
    fn spelling_variants_merge_into_first() {
        let concepts = resolve(
            EntityType::Concept,
            vec![
                json!({"name": "Rights of Nature", "related_concepts": ["earth jurisprudence"]}),
                json!({"name": "The Rights of Nature Movement", "related_concepts": ["wild law"]}),
                json!({"name": "RoN"}),
            ],
        );

        assert_eq!(concepts.len(), 1);
        assert_eq!(concepts[0].display_name(), "Rights of Nature");
        let value = concepts[0].to_value();
        assert_eq!(value["related_concepts"], json!(["earth jurisprudence", "wild law"]));
    }

    #[test]
    fn events_with_different_years_stay_apart() {
        let events = resolve(
            EntityType::Event,
            vec![
                json!({"title": "Earth Summit", "year": 1992}),
                json!({"title": "Earth Summit", "year": 2012}),
                json!({"title": "earth summit", "year": "1992"}),
            ],
        );

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].year(), Some(1992));
        assert_eq!(events[1].year(), Some(2012));
    }

    #[test]
    fn nameless_records_are_dropped_and_ids_assigned() {
        let actors = resolve(
            EntityType::Actor,
            vec![
                json!({"description": "no name at all"}),
                json!({"name": "(unknown)"}),
                json!({"name": "WHO", "id": "who-1"}),
                json!({"name": "Thomas Berry"}),
            ],
        );

        assert_eq!(actors.len(), 2);
        assert_eq!(actors[0].id, "who-1");
        assert!(Uuid::parse_str(&actors[1].id).is_ok());
    }

    #[test]
    fn keys_are_unique_after_resolution() {
        let concepts = resolve(
            EntityType::Concept,
            vec![
                json!({"name": "Gaia"}),
                json!({"name": "Gaia Theory"}),
                json!({"name": "Deep Ecology"}),
                json!({"name": "deep ecology."}),
                json!({"name": "Ecocide"}),
            ],
        );

        let mut keys: Vec<String> = concepts.iter().filter_map(EntityResolver::dedup_key).collect();
        let before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), before);
        assert_eq!(before, 3);
    }

    #[test]
    fn empty_input_resolves_to_nothing() {
        assert!(EntityResolver::new().resolve(BTreeMap::new()).is_empty());
    }
}
