//! Canonical graph records.
//!
//! Extraction hands over loose JSON objects; resolution turns them into the
//! typed records below. Fields the model produced that have no slot here are
//! kept verbatim in `extra`.

use extract::coerce::{as_i64, as_scale, as_string, as_string_list};
use extract::{ChunkRef, EntityType, RawEntity};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Canonical entities grouped by type, each list in first-seen order.
pub type EntityMap = BTreeMap<EntityType, Vec<Entity>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl EventDates {
    fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventProfile {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significance: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<EventDates>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concepts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorProfile {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expertise: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affiliations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptProfile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significance: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_concepts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_proponents: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicationProfile {
    #[serde(alias = "title")]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significance: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationProfile {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-text reason the place matters, not a rating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significance: Option<String>,
}

/// Type-specific attributes, tagged by `entity_type` in serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "lowercase")]
pub enum EntityDetails {
    Event(EventProfile),
    Actor(ActorProfile),
    Concept(ConceptProfile),
    Publication(PublicationProfile),
    Location(LocationProfile),
}

impl EntityDetails {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityDetails::Event(_) => EntityType::Event,
            EntityDetails::Actor(_) => EntityType::Actor,
            EntityDetails::Concept(_) => EntityType::Concept,
            EntityDetails::Publication(_) => EntityType::Publication,
            EntityDetails::Location(_) => EntityType::Location,
        }
    }
}

/// The relationship that caused a stub entity to be created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipContext {
    pub relationship_type: String,
    #[serde(default)]
    pub relationship_description: String,
    #[serde(default)]
    pub relationship_strength: u8,
    /// `source` or `target`
    pub entity_role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(flatten)]
    pub details: EntityDetails,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub supporting_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_chunk: Option<ChunkRef>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_created_from_relationship: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_context: Option<RelationshipContext>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<String>, details: EntityDetails) -> Self {
        Self {
            id: id.into(),
            details,
            supporting_text: String::new(),
            source_chunk: None,
            auto_created_from_relationship: false,
            relationship_context: None,
            extra: Map::new(),
        }
    }

    /// Lift a model-produced record into a typed entity. Unknown fields and
    /// values that do not fit their slot land in `extra`. The id is empty
    /// unless the record carried one.
    pub fn from_raw(entity_type: EntityType, raw: RawEntity) -> Self {
        let mut fields = raw.fields;

        let id = take_string(&mut fields, "id").unwrap_or_default();
        let supporting_text = take_string(&mut fields, "supporting_text").unwrap_or_default();
        let source_chunk = fields
            .remove("source_chunk")
            .and_then(|v| serde_json::from_value(v).ok());
        let auto_created = fields
            .remove("auto_created_from_relationship")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let relationship_context = fields
            .remove("relationship_context")
            .and_then(|v| serde_json::from_value(v).ok());

        let details = match entity_type {
            EntityType::Event => EntityDetails::Event(EventProfile {
                title: take_either(&mut fields, "title", "name"),
                year: take_year(&mut fields),
                description: take_string(&mut fields, "description"),
                category: take_string(&mut fields, "type"),
                significance: take_scale(&mut fields, "significance"),
                dates: take_dates(&mut fields),
                locations: take_list(&mut fields, "locations"),
                actors: take_list(&mut fields, "actors"),
                concepts: take_list(&mut fields, "concepts"),
            }),
            EntityType::Actor => EntityDetails::Actor(ActorProfile {
                name: take_either(&mut fields, "name", "title"),
                category: take_string(&mut fields, "type"),
                description: take_string(&mut fields, "description"),
                role: take_string(&mut fields, "role"),
                country: take_string(&mut fields, "country"),
                expertise: take_list(&mut fields, "expertise"),
                affiliations: take_list(&mut fields, "affiliations"),
            }),
            EntityType::Concept => EntityDetails::Concept(ConceptProfile {
                name: take_either(&mut fields, "name", "title"),
                definition: take_string(&mut fields, "definition"),
                description: take_string(&mut fields, "description"),
                significance: take_scale(&mut fields, "significance"),
                alternative_names: take_list(&mut fields, "alternative_names"),
                domain: take_list(&mut fields, "domain"),
                related_concepts: take_list(&mut fields, "related_concepts"),
                key_proponents: take_list(&mut fields, "key_proponents"),
            }),
            EntityType::Publication => EntityDetails::Publication(PublicationProfile {
                name: take_either(&mut fields, "name", "title"),
                category: take_string(&mut fields, "type"),
                year: take_year(&mut fields),
                description: take_string(&mut fields, "description"),
                publisher: take_string(&mut fields, "publisher"),
                identifier: take_string(&mut fields, "identifier"),
                summary: take_string(&mut fields, "abstract"),
                significance: take_scale(&mut fields, "significance"),
                authors: take_list(&mut fields, "authors"),
            }),
            EntityType::Location => EntityDetails::Location(LocationProfile {
                name: take_either(&mut fields, "name", "title"),
                category: take_string(&mut fields, "type"),
                country: take_string(&mut fields, "country"),
                description: take_string(&mut fields, "description"),
                significance: take_string(&mut fields, "significance"),
            }),
        };

        fields.retain(|_, v| !v.is_null());

        Self {
            id,
            details,
            supporting_text,
            source_chunk,
            auto_created_from_relationship: auto_created,
            relationship_context,
            extra: fields,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.details.entity_type()
    }

    /// Title for events, name for everything else.
    pub fn display_name(&self) -> &str {
        match &self.details {
            EntityDetails::Event(e) => &e.title,
            EntityDetails::Actor(a) => &a.name,
            EntityDetails::Concept(c) => &c.name,
            EntityDetails::Publication(p) => &p.name,
            EntityDetails::Location(l) => &l.name,
        }
    }

    pub fn year(&self) -> Option<i32> {
        match &self.details {
            EntityDetails::Event(e) => e.year,
            EntityDetails::Publication(p) => p.year,
            _ => None,
        }
    }

    /// Best human-readable summary: description, then a concept's
    /// definition, then a publication's abstract.
    pub fn description(&self) -> Option<&str> {
        match &self.details {
            EntityDetails::Event(e) => e.description.as_deref(),
            EntityDetails::Actor(a) => a.description.as_deref(),
            EntityDetails::Concept(c) => c.description.as_deref().or(c.definition.as_deref()),
            EntityDetails::Publication(p) => p.description.as_deref().or(p.summary.as_deref()),
            EntityDetails::Location(l) => l.description.as_deref(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A resolved edge between two canonical entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub source_id: String,
    pub source_type: EntityType,
    pub target_id: String,
    pub target_type: EntityType,
    pub relationship_type: String,
    #[serde(default)]
    pub description: String,
    pub strength: u8,
    #[serde(default)]
    pub supporting_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_chunk: Option<ChunkRef>,
}

impl Relationship {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Id-keyed view over every entity in a map.
pub fn index_by_id(entities: &EntityMap) -> HashMap<&str, &Entity> {
    entities
        .values()
        .flatten()
        .map(|entity| (entity.id.as_str(), entity))
        .collect()
}

pub fn entity_count(entities: &EntityMap) -> usize {
    entities.values().map(Vec::len).sum()
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    let value = fields.remove(key)?;
    let text = as_string(&value);
    if text.is_none() && !value.is_null() {
        fields.insert(key.to_string(), value);
    }
    text
}

fn take_either(fields: &mut Map<String, Value>, primary: &str, fallback: &str) -> String {
    take_string(fields, primary)
        .or_else(|| take_string(fields, fallback))
        .unwrap_or_default()
}

fn take_list(fields: &mut Map<String, Value>, key: &str) -> Vec<String> {
    fields
        .remove(key)
        .map(|v| as_string_list(&v))
        .unwrap_or_default()
}

fn take_scale(fields: &mut Map<String, Value>, key: &str) -> Option<u8> {
    let value = fields.remove(key)?;
    let scale = as_scale(&value);
    if scale.is_none() && !value.is_null() {
        fields.insert(key.to_string(), value);
    }
    scale
}

fn take_year(fields: &mut Map<String, Value>) -> Option<i32> {
    let value = fields.remove("year")?;
    let year = as_i64(&value).and_then(|y| i32::try_from(y).ok());
    if year.is_none() && !value.is_null() {
        fields.insert("year".to_string(), value);
    }
    year
}

fn take_dates(fields: &mut Map<String, Value>) -> Option<EventDates> {
    let dates = match fields.remove("dates")? {
        Value::Object(range) => EventDates {
            start: range.get("start").and_then(as_string),
            end: range.get("end").and_then(as_string),
        },
        other => EventDates {
            start: as_string(&other),
            end: None,
        },
    };
    (!dates.is_empty()).then_some(dates)
}
