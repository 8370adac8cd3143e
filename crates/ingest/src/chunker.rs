use crate::chunk::{Chunk, estimate_tokens};

pub struct ChunkerConfig {
    pub target_tokens_max: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_tokens_max: 900,
            overlap_tokens: 100,
        }
    }
}

struct Section {
    title: Option<String>,
    start: usize,
    body: String,
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split a document into chunks: one per markdown section when it fits,
    /// otherwise paragraph-packed chunks with a word overlap between them.
    pub fn chunk_text(&self, doc_id: &str, text: &str, source: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for section in self.split_by_headings(text) {
            let title = section.title.as_deref();

            if estimate_tokens(&section.body) <= self.config.target_tokens_max {
                if !section.body.trim().is_empty() {
                    let end = section.start + section.body.len();
                    chunks.push(Chunk::new(
                        doc_id.to_string(),
                        section.body.clone(),
                        source,
                        (section.start, end),
                        title,
                    ));
                }
                continue;
            }

            let mut buffer = String::new();
            let mut buffer_start = section.start;
            let mut cursor = section.start;

            for para in split_by_paragraphs(&section.body) {
                let projected = estimate_tokens(&buffer) + estimate_tokens(para);
                if !buffer.is_empty() && projected > self.config.target_tokens_max {
                    chunks.push(Chunk::new(
                        doc_id.to_string(),
                        buffer.clone(),
                        source,
                        (buffer_start, cursor),
                        title,
                    ));

                    let overlap = overlap_tail(&buffer, self.config.overlap_tokens);
                    buffer_start = cursor.saturating_sub(overlap.len());
                    buffer = overlap;
                    buffer.push_str("\n\n");
                }

                buffer.push_str(para);
                buffer.push_str("\n\n");
                cursor += para.len() + 2;
            }

            if !buffer.trim().is_empty() {
                chunks.push(Chunk::new(
                    doc_id.to_string(),
                    buffer,
                    source,
                    (buffer_start, cursor),
                    title,
                ));
            }
        }

        chunks
    }

    fn split_by_headings(&self, text: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut current = Section {
            title: None,
            start: 0,
            body: String::new(),
        };
        let mut offset = 0;

        for line in text.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with('#') {
                if !current.body.is_empty() {
                    sections.push(current);
                }
                current = Section {
                    title: Some(trimmed.trim_start_matches('#').trim().to_string()),
                    start: offset,
                    body: String::new(),
                };
            }
            current.body.push_str(line);
            current.body.push('\n');
            offset += line.len() + 1;
        }

        if !current.body.is_empty() {
            sections.push(current);
        }

        sections
    }
}

fn split_by_paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn overlap_tail(text: &str, target_tokens: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let target_words = (target_tokens as f64 / 1.3) as usize;

    if words.len() <= target_words {
        return words.join(" ");
    }

    words[words.len() - target_words..].join(" ")
}
