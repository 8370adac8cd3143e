//! Entity and relationship resolution.
//!
//! Raw extractions are merged into canonical entities by exact normalized
//! key, relationship endpoints are bound to those entities (exact name,
//! then fuzzy name, then a synthesized stub), and repeated edges are dropped.

pub mod dedupe;
pub mod enrich;
pub mod entities;
pub mod graph;
pub mod merge;
pub mod model;
pub mod normalizer;
pub mod relationships;
pub mod similarity;

pub use dedupe::dedupe_relationships;
pub use enrich::{EnrichedRelationship, enrich_relationships};
pub use entities::EntityResolver;
pub use graph::KnowledgeGraph;
pub use model::{
    ActorProfile, ConceptProfile, Entity, EntityDetails, EntityMap, EventDates, EventProfile,
    LocationProfile, PublicationProfile, Relationship, RelationshipContext, index_by_id,
};
pub use normalizer::{NameIndex, normalize};
pub use relationships::{RelationshipResolver, ResolutionReport};
pub use similarity::similarity;

use extract::{EntityType, RawEntity, RawRelationship};
use std::collections::BTreeMap;

/// One full resolution pass: entities, then relationships against them,
/// then edge deduplication.
pub fn resolve_graph(
    entities: BTreeMap<EntityType, Vec<RawEntity>>,
    relationships: Vec<RawRelationship>,
) -> (KnowledgeGraph, ResolutionReport) {
    let mut canonical = EntityResolver::new().resolve(entities);
    let (resolved, report) = RelationshipResolver::new().resolve(relationships, &mut canonical);
    let relationships = dedupe_relationships(resolved);
    (KnowledgeGraph::from_parts(canonical, relationships), report)
}
