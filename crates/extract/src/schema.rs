use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::coerce;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Event,
    Actor,
    Concept,
    Publication,
    Location,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Event,
        EntityType::Actor,
        EntityType::Concept,
        EntityType::Publication,
        EntityType::Location,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Event => "event",
            EntityType::Actor => "actor",
            EntityType::Concept => "concept",
            EntityType::Publication => "publication",
            EntityType::Location => "location",
        }
    }

    /// Key of the entity list in extraction responses and output files.
    pub fn plural(&self) -> &'static str {
        match self {
            EntityType::Event => "events",
            EntityType::Actor => "actors",
            EntityType::Concept => "concepts",
            EntityType::Publication => "publications",
            EntityType::Location => "locations",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEntityType(pub String);

impl fmt::Display for UnknownEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown entity type `{}`", self.0)
    }
}

impl std::error::Error for UnknownEntityType {}

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "event" | "events" => Ok(EntityType::Event),
            "actor" | "actors" => Ok(EntityType::Actor),
            "concept" | "concepts" => Ok(EntityType::Concept),
            "publication" | "publications" => Ok(EntityType::Publication),
            "location" | "locations" => Ok(EntityType::Location),
            other => Err(UnknownEntityType(other.to_string())),
        }
    }
}

/// Provenance of an extracted record: chunk position or chunk id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkRef {
    Index(usize),
    Id(String),
}

/// An entity exactly as the model produced it, plus the provenance the
/// extractor stamps on (`source_chunk`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEntity {
    pub fields: Map<String, Value>,
}

impl RawEntity {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.fields.get(key).and_then(coerce::as_string)
    }

    /// `title` for events, `name` for the rest; publications fall back to
    /// `title` because the publication prompt asks for one.
    pub fn display_name(&self, entity_type: EntityType) -> Option<String> {
        match entity_type {
            EntityType::Event => self.get_str("title").or_else(|| self.get_str("name")),
            _ => self.get_str("name").or_else(|| self.get_str("title")),
        }
    }

    pub fn source_chunk(&self) -> Option<ChunkRef> {
        self.fields
            .get("source_chunk")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set_source_chunk(&mut self, chunk: ChunkRef) {
        let value = match chunk {
            ChunkRef::Index(i) => Value::from(i),
            ChunkRef::Id(id) => Value::from(id),
        };
        self.fields.insert("source_chunk".to_string(), value);
    }
}

/// A relationship as extracted, endpoints still named by free text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRelationship {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "source", default, deserialize_with = "coerce::lenient_string")]
    pub source_name: String,
    #[serde(default, deserialize_with = "coerce::lenient_string")]
    pub source_type: String,
    #[serde(alias = "target", default, deserialize_with = "coerce::lenient_string")]
    pub target_name: String,
    #[serde(default, deserialize_with = "coerce::lenient_string")]
    pub target_type: String,
    #[serde(default, deserialize_with = "coerce::lenient_string")]
    pub relationship_type: String,
    #[serde(default, deserialize_with = "coerce::lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "coerce::lenient_scale")]
    pub strength: Option<u8>,
    #[serde(default, deserialize_with = "coerce::lenient_string")]
    pub supporting_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_chunk: Option<ChunkRef>,
}

/// What one oracle extraction call asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionTarget {
    Entities(EntityType),
    Relationships,
}

impl fmt::Display for ExtractionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionTarget::Entities(t) => write!(f, "{}", t.plural()),
            ExtractionTarget::Relationships => f.write_str("relationships"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    pub chunk: usize,
    pub target: String,
    pub error: String,
}

/// Everything extracted from one chunk. Failed calls contribute nothing but
/// a failure record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkExtraction {
    pub entities: BTreeMap<EntityType, Vec<RawEntity>>,
    pub relationships: Vec<RawRelationship>,
    pub failures: Vec<ExtractionFailure>,
}

impl ChunkExtraction {
    pub fn entity_count(&self) -> usize {
        self.entities.values().map(Vec::len).sum()
    }

    /// Fold another chunk's results into this accumulator.
    pub fn absorb(&mut self, other: ChunkExtraction) {
        for (entity_type, list) in other.entities {
            self.entities.entry(entity_type).or_default().extend(list);
        }
        self.relationships.extend(other.relationships);
        self.failures.extend(other.failures);
    }
}
