use serde_json::Value;

use crate::model::{Entity, EntityDetails};

/// Fold `incoming` into `acc`, which keeps its id and identity.
///
/// Lists are unioned in first-seen order and numeric significance keeps the
/// maximum. A differing description is appended after a space and differing
/// supporting text after `" | "`; text is only compared whole, so repeated
/// fragments are kept. Every other field the accumulator lacks is taken from
/// `incoming`.
pub fn merge_into(acc: &mut Entity, incoming: Entity) {
    merge_text(&mut acc.supporting_text, incoming.supporting_text, " | ");
    fill(&mut acc.source_chunk, incoming.source_chunk);
    acc.auto_created_from_relationship |= incoming.auto_created_from_relationship;
    fill(&mut acc.relationship_context, incoming.relationship_context);

    for (key, value) in incoming.extra {
        let missing = acc.extra.get(&key).is_none_or(is_falsy);
        if missing && !is_falsy(&value) {
            acc.extra.insert(key, value);
        }
    }

    match (&mut acc.details, incoming.details) {
        (EntityDetails::Event(a), EntityDetails::Event(b)) => {
            fill_name(&mut a.title, b.title);
            fill(&mut a.year, b.year);
            merge_description(&mut a.description, b.description);
            fill(&mut a.category, b.category);
            keep_max(&mut a.significance, b.significance);
            fill(&mut a.dates, b.dates);
            union(&mut a.locations, b.locations);
            union(&mut a.actors, b.actors);
            union(&mut a.concepts, b.concepts);
        }
        (EntityDetails::Actor(a), EntityDetails::Actor(b)) => {
            fill_name(&mut a.name, b.name);
            fill(&mut a.category, b.category);
            merge_description(&mut a.description, b.description);
            fill(&mut a.role, b.role);
            fill(&mut a.country, b.country);
            union(&mut a.expertise, b.expertise);
            union(&mut a.affiliations, b.affiliations);
        }
        (EntityDetails::Concept(a), EntityDetails::Concept(b)) => {
            fill_name(&mut a.name, b.name);
            fill(&mut a.definition, b.definition);
            merge_description(&mut a.description, b.description);
            keep_max(&mut a.significance, b.significance);
            union(&mut a.alternative_names, b.alternative_names);
            union(&mut a.domain, b.domain);
            union(&mut a.related_concepts, b.related_concepts);
            union(&mut a.key_proponents, b.key_proponents);
        }
        (EntityDetails::Publication(a), EntityDetails::Publication(b)) => {
            fill_name(&mut a.name, b.name);
            fill(&mut a.category, b.category);
            fill(&mut a.year, b.year);
            merge_description(&mut a.description, b.description);
            fill(&mut a.publisher, b.publisher);
            fill(&mut a.identifier, b.identifier);
            fill(&mut a.summary, b.summary);
            keep_max(&mut a.significance, b.significance);
            union(&mut a.authors, b.authors);
        }
        (EntityDetails::Location(a), EntityDetails::Location(b)) => {
            fill_name(&mut a.name, b.name);
            fill(&mut a.category, b.category);
            fill(&mut a.country, b.country);
            merge_description(&mut a.description, b.description);
            fill(&mut a.significance, b.significance);
        }
        // Entities of different types never share a key.
        _ => {}
    }
}

fn fill<T>(acc: &mut Option<T>, incoming: Option<T>) {
    if acc.is_none() {
        *acc = incoming;
    }
}

fn fill_name(acc: &mut String, incoming: String) {
    if acc.trim().is_empty() {
        *acc = incoming;
    }
}

fn keep_max(acc: &mut Option<u8>, incoming: Option<u8>) {
    *acc = match (*acc, incoming) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
}

fn merge_description(acc: &mut Option<String>, incoming: Option<String>) {
    let Some(other) = incoming else {
        return;
    };
    if acc.is_none() {
        *acc = Some(other);
        return;
    }
    if let Some(existing) = acc.as_mut() {
        if *existing != other {
            existing.push(' ');
            existing.push_str(&other);
        }
    }
}

fn merge_text(acc: &mut String, incoming: String, separator: &str) {
    if incoming.is_empty() || *acc == incoming {
        return;
    }
    if acc.is_empty() {
        *acc = incoming;
    } else {
        acc.push_str(separator);
        acc.push_str(&incoming);
    }
}

fn union(acc: &mut Vec<String>, incoming: Vec<String>) {
    for item in incoming {
        if !acc.contains(&item) {
            acc.push(item);
        }
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
    }
}
