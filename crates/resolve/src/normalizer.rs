use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use extract::EntityType;

static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)").expect("parenthetical pattern"));
static LEADING_ARTICLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(the|a|an)\s+").expect("article pattern"));
static GENERIC_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+(movements?|laws?|concepts?|theories|theorys?|models?)$")
        .expect("suffix pattern")
});
static ABBREVIATIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        ("ron", "rights of nature"),
        ("us", "united states"),
        ("uk", "united kingdom"),
    ]
    .into_iter()
    .map(|(abbrev, full)| {
        let pattern = format!(r"\b{abbrev}\b");
        (Regex::new(&pattern).expect("abbreviation pattern"), full)
    })
    .collect()
});
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("punctuation pattern"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Canonical comparison form of an entity name.
///
/// The pass is repeated until nothing changes, so stacked articles or a
/// suffix exposed by punctuation removal are stripped too and the result is
/// stable under a second call.
pub fn normalize(name: &str) -> String {
    let mut current = normalize_pass(name);
    loop {
        let next = normalize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_pass(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    let lowered = name.to_lowercase();
    let without_qualifiers = PARENTHETICAL.replace_all(&lowered, "");
    // Affixes go before abbreviation expansion so "us" is never read as a suffix.
    let trimmed = without_qualifiers.trim();
    let without_article = LEADING_ARTICLE.replace(trimmed, "");
    let mut normalized = GENERIC_SUFFIX.replace(&without_article, "").into_owned();

    for (pattern, full) in ABBREVIATIONS.iter() {
        normalized = pattern.replace_all(&normalized, *full).into_owned();
    }

    let without_punctuation = PUNCTUATION.replace_all(&normalized, "");
    WHITESPACE
        .replace_all(&without_punctuation, " ")
        .trim()
        .to_string()
}

/// Exact-name lookup table: per entity type, lowercase and normalized
/// spellings mapped to the canonical entity id.
#[derive(Debug, Default, Clone)]
pub struct NameIndex {
    names: HashMap<EntityType, HashMap<String, String>>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register both spellings of a name. The first id registered for a
    /// spelling keeps it.
    pub fn insert(&mut self, entity_type: EntityType, name: &str, id: &str) {
        if name.trim().is_empty() {
            return;
        }
        let by_name = self.names.entry(entity_type).or_default();

        by_name
            .entry(name.to_lowercase())
            .or_insert_with(|| id.to_string());

        let normalized = normalize(name);
        if !normalized.is_empty() {
            by_name.entry(normalized).or_insert_with(|| id.to_string());
        }
    }

    pub fn lookup(&self, entity_type: EntityType, name: &str) -> Option<&str> {
        let by_name = self.names.get(&entity_type)?;
        by_name
            .get(&name.to_lowercase())
            .or_else(|| by_name.get(&normalize(name)))
            .map(String::as_str)
    }

    /// Number of distinct spellings indexed for a type
    pub fn len(&self, entity_type: EntityType) -> usize {
        self.names.get(&entity_type).map_or(0, HashMap::len)
    }
}
