use std::collections::HashSet;
use tracing::debug;

use crate::model::Relationship;

/// Drop repeated `(source_id, target_id, relationship_type)` triples,
/// keeping the first occurrence. Direction matters: A→B and B→A are
/// distinct edges.
pub fn dedupe_relationships(relationships: Vec<Relationship>) -> Vec<Relationship> {
    let before = relationships.len();
    let mut seen: HashSet<(String, String, String)> = HashSet::with_capacity(before);

    let unique: Vec<Relationship> = relationships
        .into_iter()
        .filter(|rel| {
            seen.insert((
                rel.source_id.clone(),
                rel.target_id.clone(),
                rel.relationship_type.clone(),
            ))
        })
        .collect();

    debug!(before, after = unique.len(), "Deduplicated relationships");
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::EntityType;

    fn rel(id: &str, source: &str, target: &str, kind: &str) -> Relationship {
        Relationship {
            id: id.to_string(),
            source_id: source.to_string(),
            source_type: EntityType::Actor,
            target_id: target.to_string(),
            target_type: EntityType::Concept,
            relationship_type: kind.to_string(),
            description: String::new(),
            strength: 3,
            supporting_text: String::new(),
            source_chunk: None,
        }
    }

    #[test]
    fn keeps_first_of_each_triple() {
        let unique = dedupe_relationships(vec![
            rel("r1", "A", "B", "develops"),
            rel("r2", "A", "B", "develops"),
            rel("r3", "A", "B", "critiques"),
        ]);

        let ids: Vec<&str> = unique.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r3"]);
    }

    #[test]
    fn reversed_direction_is_distinct() {
        let unique =
            dedupe_relationships(vec![rel("r1", "A", "B", "cites"), rel("r2", "B", "A", "cites")]);
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let once = dedupe_relationships(vec![
            rel("r1", "A", "B", "x"),
            rel("r2", "A", "B", "x"),
            rel("r3", "C", "B", "x"),
        ]);
        assert_eq!(dedupe_relationships(once.clone()), once);
    }
}
