use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// A bounded span of document text handed to the extraction oracle.
///
/// Chunk files written by other tools only need `text`; everything else is
/// optional so those files load unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Chunk {
    pub fn new(
        doc_id: String,
        text: String,
        source: &str,
        offset: (usize, usize),
        section_title: Option<&str>,
    ) -> Self {
        let chunk_id = Self::generate_chunk_id(&doc_id, &text, offset);

        let mut metadata = Map::new();
        metadata.insert("source".to_string(), Value::from(source));
        metadata.insert("start".to_string(), Value::from(offset.0));
        metadata.insert("end".to_string(), Value::from(offset.1));
        if let Some(title) = section_title {
            metadata.insert("section_title".to_string(), Value::from(title));
        }

        Self {
            chunk_id: Some(chunk_id),
            doc_id,
            text,
            metadata,
        }
    }

    /// Plain text chunk with no provenance, as produced by external chunkers.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    fn generate_chunk_id(doc_id: &str, text: &str, offset: (usize, usize)) -> String {
        let mut hasher = Sha256::new();
        hasher.update(doc_id.as_bytes());
        hasher.update(text.as_bytes());
        hasher.update(offset.0.to_string().as_bytes());
        hasher.update(offset.1.to_string().as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16])
    }

    pub fn section_title(&self) -> Option<&str> {
        self.metadata.get("section_title").and_then(Value::as_str)
    }

    /// Estimate token count (rough: 1.3 tokens per word)
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.text)
    }

    /// First `max_chars` characters of the text, with "..." appended when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        match self.text.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &self.text[..cut]),
            None => self.text.clone(),
        }
    }
}

pub(crate) fn estimate_tokens(text: &str) -> usize {
    let word_count = text.split_whitespace().count();
    (word_count as f64 * 1.3) as usize
}
