use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use extract::{EntityType, RawRelationship};

use crate::model::{
    ActorProfile, ConceptProfile, Entity, EntityDetails, EntityMap, EventProfile,
    LocationProfile, PublicationProfile, Relationship, RelationshipContext,
};
use crate::normalizer::NameIndex;
use crate::similarity::similarity;

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("year pattern"));

/// Fuzzy matches must score strictly above this.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;
pub const DEFAULT_STRENGTH: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Source,
    Target,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Source => "source",
            Role::Target => "target",
        })
    }
}

/// How each endpoint of a batch was resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionReport {
    pub resolved: usize,
    pub skipped: usize,
    pub exact_matches: usize,
    pub fuzzy_matches: usize,
    pub synthesized: BTreeMap<EntityType, usize>,
}

impl ResolutionReport {
    pub fn synthesized_total(&self) -> usize {
        self.synthesized.values().sum()
    }
}

/// Binds free-text relationship endpoints to canonical entity ids, creating
/// stub entities for names nothing matches.
#[derive(Debug, Clone)]
pub struct RelationshipResolver {
    threshold: f64,
}

impl Default for RelationshipResolver {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl RelationshipResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Resolve a batch in order. Stubs created along the way are appended to
    /// `entities` and are visible to every later relationship in the batch.
    pub fn resolve(
        &self,
        raw: Vec<RawRelationship>,
        entities: &mut EntityMap,
    ) -> (Vec<Relationship>, ResolutionReport) {
        let mut index = NameIndex::new();
        for (entity_type, list) in entities.iter() {
            for entity in list {
                index.insert(*entity_type, entity.display_name(), &entity.id);
            }
        }

        let mut report = ResolutionReport::default();
        let mut resolved = Vec::with_capacity(raw.len());

        for relationship in raw {
            let (Ok(source_type), Ok(target_type)) = (
                relationship.source_type.parse::<EntityType>(),
                relationship.target_type.parse::<EntityType>(),
            ) else {
                warn!(
                    source_type = %relationship.source_type,
                    target_type = %relationship.target_type,
                    "Skipping relationship with unknown endpoint type"
                );
                report.skipped += 1;
                continue;
            };

            if relationship.source_name.trim().is_empty()
                || relationship.target_name.trim().is_empty()
            {
                warn!(
                    relationship_type = %relationship.relationship_type,
                    "Skipping relationship with an unnamed endpoint"
                );
                report.skipped += 1;
                continue;
            }

            let source_id = self.resolve_endpoint(
                &relationship,
                Role::Source,
                source_type,
                &mut index,
                entities,
                &mut report,
            );
            let target_id = self.resolve_endpoint(
                &relationship,
                Role::Target,
                target_type,
                &mut index,
                entities,
                &mut report,
            );

            resolved.push(Relationship {
                id: Uuid::new_v4().to_string(),
                source_id,
                source_type,
                target_id,
                target_type,
                relationship_type: relationship.relationship_type,
                description: relationship.description,
                strength: relationship.strength.unwrap_or(DEFAULT_STRENGTH),
                supporting_text: relationship.supporting_text,
                source_chunk: relationship.source_chunk,
            });
            report.resolved += 1;
        }

        info!(
            resolved = report.resolved,
            skipped = report.skipped,
            exact = report.exact_matches,
            fuzzy = report.fuzzy_matches,
            synthesized = report.synthesized_total(),
            "Resolved relationships"
        );
        (resolved, report)
    }

    fn resolve_endpoint(
        &self,
        relationship: &RawRelationship,
        role: Role,
        entity_type: EntityType,
        index: &mut NameIndex,
        entities: &mut EntityMap,
        report: &mut ResolutionReport,
    ) -> String {
        let name = match role {
            Role::Source => relationship.source_name.as_str(),
            Role::Target => relationship.target_name.as_str(),
        };

        if let Some(id) = index.lookup(entity_type, name) {
            report.exact_matches += 1;
            return id.to_string();
        }

        if let Some(id) = self.best_match(name, entity_type, entities) {
            debug!(
                endpoint = name,
                entity_type = %entity_type,
                "Fuzzy matched relationship endpoint"
            );
            report.fuzzy_matches += 1;
            return id;
        }

        let stub = synthesize_entity(name, entity_type, relationship, role);
        debug!(
            endpoint = name,
            entity_type = %entity_type,
            id = %stub.id,
            "Created entity from relationship"
        );
        let id = stub.id.clone();
        index.insert(entity_type, name, &id);
        entities.entry(entity_type).or_default().push(stub);
        *report.synthesized.entry(entity_type).or_default() += 1;
        id
    }

    /// Highest-scoring entity of the type above the threshold; earliest wins
    /// ties.
    fn best_match(
        &self,
        name: &str,
        entity_type: EntityType,
        entities: &EntityMap,
    ) -> Option<String> {
        let mut best: Option<&Entity> = None;
        let mut best_score = self.threshold;

        for entity in entities.get(&entity_type)? {
            let score = similarity(name, entity.display_name());
            if score > best_score {
                best_score = score;
                best = Some(entity);
            }
        }
        best.map(|entity| entity.id.clone())
    }
}

fn year_in(text: &str) -> Option<i32> {
    YEAR.find(text).and_then(|m| m.as_str().parse().ok())
}

fn synthesize_entity(
    name: &str,
    entity_type: EntityType,
    relationship: &RawRelationship,
    role: Role,
) -> Entity {
    let description = Some(format!(
        "Auto-created {entity_type} from relationship: {}",
        relationship.description
    ));
    let other = || Some("Other".to_string());

    let details = match entity_type {
        EntityType::Event => EntityDetails::Event(EventProfile {
            title: name.to_string(),
            year: year_in(name),
            description,
            category: other(),
            significance: Some(DEFAULT_STRENGTH),
            ..Default::default()
        }),
        EntityType::Actor => EntityDetails::Actor(ActorProfile {
            name: name.to_string(),
            category: other(),
            description,
            role: Some("Extracted from relationship".to_string()),
            ..Default::default()
        }),
        EntityType::Concept => {
            let counterpart = match role {
                Role::Source => &relationship.target_name,
                Role::Target => &relationship.source_name,
            };
            EntityDetails::Concept(ConceptProfile {
                name: name.to_string(),
                definition: Some(format!("Concept extracted from relationship with {counterpart}")),
                description,
                significance: Some(DEFAULT_STRENGTH),
                ..Default::default()
            })
        }
        EntityType::Publication => EntityDetails::Publication(PublicationProfile {
            name: name.to_string(),
            category: other(),
            year: year_in(name),
            description,
            ..Default::default()
        }),
        EntityType::Location => EntityDetails::Location(LocationProfile {
            name: name.to_string(),
            category: other(),
            description,
            ..Default::default()
        }),
    };

    let mut entity = Entity::new(Uuid::new_v4().to_string(), details);
    entity.auto_created_from_relationship = true;
    entity.source_chunk = relationship.source_chunk.clone();
    entity.relationship_context = Some(RelationshipContext {
        relationship_type: relationship.relationship_type.clone(),
        relationship_description: relationship.description.clone(),
        relationship_strength: relationship.strength.unwrap_or(DEFAULT_STRENGTH),
        entity_role: role.to_string(),
    });
    entity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityResolver;
    use extract::{ChunkRef, RawEntity};
    use serde_json::{Value, json};

    fn entities(records: Vec<(EntityType, Value)>) -> EntityMap {
        let mut raw: BTreeMap<EntityType, Vec<RawEntity>> = BTreeMap::new();
        for (entity_type, value) in records {
            if let Value::Object(fields) = value {
                raw.entry(entity_type).or_default().push(RawEntity::new(fields));
            }
        }
        EntityResolver::new().resolve(raw)
    }

    fn relationship(source: (&str, &str), target: (&str, &str), kind: &str) -> RawRelationship {
        RawRelationship {
            source_name: source.0.to_string(),
            source_type: source.1.to_string(),
            target_name: target.0.to_string(),
            target_type: target.1.to_string(),
            relationship_type: kind.to_string(),
            description: format!("{} {kind} {}", source.0, target.0),
            source_chunk: Some(ChunkRef::Index(2)),
            ..Default::default()
        }
    }

    fn find<'a>(map: &'a EntityMap, entity_type: EntityType, name: &str) -> Option<&'a Entity> {
        map.get(&entity_type)?.iter().find(|e| e.display_name() == name)
    }

    #[test]
    fn missing_endpoint_is_synthesized() {
        let mut map = entities(vec![(
            EntityType::Event,
            json!({"title": "Paris Agreement", "year": 2015}),
        )]);

        let (resolved, report) = RelationshipResolver::new().resolve(
            vec![relationship(("Paris Agreement", "event"), ("UNFCCC", "actor"), "Adopted by")],
            &mut map,
        );

        assert_eq!(resolved.len(), 1);
        let paris = find(&map, EntityType::Event, "Paris Agreement").unwrap();
        let unfccc = find(&map, EntityType::Actor, "UNFCCC").unwrap();
        assert_eq!(resolved[0].source_id, paris.id);
        assert_eq!(resolved[0].target_id, unfccc.id);
        assert_eq!(resolved[0].strength, DEFAULT_STRENGTH);

        assert!(unfccc.auto_created_from_relationship);
        let context = unfccc.relationship_context.as_ref().unwrap();
        assert_eq!(context.entity_role, "target");
        assert_eq!(context.relationship_type, "Adopted by");
        assert_eq!(unfccc.source_chunk, Some(ChunkRef::Index(2)));
        let EntityDetails::Actor(actor) = &unfccc.details else {
            panic!("expected actor");
        };
        assert_eq!(actor.role.as_deref(), Some("Extracted from relationship"));

        assert_eq!(report.exact_matches, 1);
        assert_eq!(report.synthesized.get(&EntityType::Actor), Some(&1));
    }

    #[test]
    fn fuzzy_match_binds_to_existing_entity() {
        let mut map = entities(vec![(
            EntityType::Concept,
            json!({"name": "Indigenous Rights Declaration"}),
        )]);

        let (resolved, report) = RelationshipResolver::new().resolve(
            vec![relationship(
                ("Indigenous Rights Declaration of 2007", "concept"),
                ("Planetary Health", "concept"),
                "Informs",
            )],
            &mut map,
        );

        let declaration = find(&map, EntityType::Concept, "Indigenous Rights Declaration").unwrap();
        assert_eq!(resolved[0].source_id, declaration.id);
        assert_eq!(report.fuzzy_matches, 1);
        assert_eq!(map[&EntityType::Concept].len(), 2);
    }

    #[test]
    fn stubs_are_reused_within_a_batch() {
        let mut map = EntityMap::new();

        let (resolved, report) = RelationshipResolver::new().resolve(
            vec![
                relationship(
                    ("Thomas Berry", "actor"),
                    ("Earth Jurisprudence", "concept"),
                    "Develops",
                ),
                relationship(
                    ("Cormac Cullinan", "actor"),
                    ("Earth Jurisprudence", "concept"),
                    "Advances",
                ),
            ],
            &mut map,
        );

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].target_id, resolved[1].target_id);
        assert_eq!(map[&EntityType::Concept].len(), 1);
        assert_eq!(report.synthesized_total(), 3);

        let concept = find(&map, EntityType::Concept, "Earth Jurisprudence").unwrap();
        let EntityDetails::Concept(profile) = &concept.details else {
            panic!("expected concept");
        };
        assert_eq!(
            profile.definition.as_deref(),
            Some("Concept extracted from relationship with Thomas Berry")
        );
    }

    #[test]
    fn every_id_resolves_to_an_entity() {
        let mut map = entities(vec![
            (EntityType::Actor, json!({"name": "Rockefeller Foundation"})),
            (
                EntityType::Publication,
                json!({"title": "Safeguarding Human Health in the Anthropocene"}),
            ),
        ]);

        let (resolved, _) = RelationshipResolver::new().resolve(
            vec![
                relationship(
                    ("Rockefeller Foundation", "Actor"),
                    ("Safeguarding Human Health in the Anthropocene", "Publication"),
                    "Funds",
                ),
                relationship(
                    ("Lancet Commission 2015", "publication"),
                    ("Oslo", "locations"),
                    "Launched in",
                ),
                relationship(("Rio 1992 Summit", "event"), ("UNEP", "actor"), "Involves"),
            ],
            &mut map,
        );

        let ids = crate::model::index_by_id(&map);
        for rel in &resolved {
            assert_eq!(ids[rel.source_id.as_str()].entity_type(), rel.source_type);
            assert_eq!(ids[rel.target_id.as_str()].entity_type(), rel.target_type);
        }
        assert_eq!(
            find(&map, EntityType::Publication, "Lancet Commission 2015").unwrap().year(),
            Some(2015)
        );
        assert_eq!(find(&map, EntityType::Event, "Rio 1992 Summit").unwrap().year(), Some(1992));
    }

    #[test]
    fn unknown_types_and_blank_names_are_skipped() {
        let mut map = EntityMap::new();
        let (resolved, report) = RelationshipResolver::new().resolve(
            vec![
                relationship(("X", "organism"), ("Y", "actor"), "Eats"),
                relationship(("  ", "actor"), ("Y", "actor"), "Knows"),
            ],
            &mut map,
        );

        assert!(resolved.is_empty());
        assert_eq!(report.skipped, 2);
        assert!(map.is_empty());
    }

    #[test]
    fn empty_batch_leaves_entities_untouched() {
        let mut map = entities(vec![(EntityType::Actor, json!({"name": "WHO"}))]);
        let before = map.clone();
        let (resolved, _) = RelationshipResolver::new().resolve(Vec::new(), &mut map);
        assert!(resolved.is_empty());
        assert_eq!(map, before);
    }
}
