pub mod chunk;
pub mod chunker;
pub mod reader;

pub use chunk::Chunk;
pub use chunker::{Chunker, ChunkerConfig};
pub use reader::FileReader;

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Generate a stable document ID from file path
pub fn generate_doc_id(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Read and chunk a single text or markdown document
pub async fn ingest_file(file_path: &Path) -> Result<Vec<Chunk>> {
    let content = FileReader::read_file(file_path).await?;
    let path_str = file_path.to_string_lossy().to_string();
    let doc_id = generate_doc_id(&path_str);

    let chunker = Chunker::new(ChunkerConfig::default());
    let chunks = chunker.chunk_text(&doc_id, &content, &path_str);
    tracing::info!(path = %path_str, chunks = chunks.len(), "Chunked document");

    Ok(chunks)
}

/// Ingest every supported document in a directory
pub async fn ingest_directory(dir_path: &Path) -> Result<Vec<Chunk>> {
    let files = FileReader::read_directory(dir_path).await?;
    let chunker = Chunker::new(ChunkerConfig::default());

    let mut all_chunks = Vec::new();
    for (path, content) in files {
        let doc_id = generate_doc_id(&path);
        all_chunks.extend(chunker.chunk_text(&doc_id, &content, &path));
    }

    Ok(all_chunks)
}

/// Load chunks from any supported source: a JSON chunk file, a document, or
/// a directory of documents.
pub async fn load_chunks(path: &Path) -> Result<Vec<Chunk>> {
    if path.is_dir() {
        return ingest_directory(path).await;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => FileReader::read_chunks(path).await,
        _ => ingest_file(path).await,
    }
}
