use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

use crate::chunk::Chunk;

pub struct FileReader;

/// Chunk files are either a bare list or an object with a `chunks` list.
#[derive(Deserialize)]
#[serde(untagged)]
enum ChunkFile {
    List(Vec<Chunk>),
    Wrapped { chunks: Vec<Chunk> },
}

impl FileReader {
    pub async fn read_file(path: &Path) -> Result<String> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension {
            "txt" | "md" => fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read file: {:?}", path)),
            _ => anyhow::bail!("Unsupported file format: {}", extension),
        }
    }

    pub async fn read_directory(dir: &Path) -> Result<Vec<(String, String)>> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to read directory: {:?}", dir))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let supported = path
                .extension()
                .is_some_and(|ext| ext == "txt" || ext == "md");

            if path.is_file() && supported {
                let content = Self::read_file(&path).await?;
                files.push((path.to_string_lossy().to_string(), content));
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// Load a previously chunked document from JSON.
    pub async fn read_chunks(path: &Path) -> Result<Vec<Chunk>> {
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read chunks file: {:?}", path))?;

        let file: ChunkFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse chunks file: {:?}", path))?;

        Ok(match file {
            ChunkFile::List(chunks) | ChunkFile::Wrapped { chunks } => chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_both_chunk_file_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("list.json");
        let wrapped = dir.path().join("wrapped.json");
        std::fs::write(&list, r#"[{"text": "a"}, {"text": "b"}]"#).unwrap();
        std::fs::write(&wrapped, r#"{"chunks": [{"text": "c", "chunk_id": "c1"}]}"#).unwrap();

        assert_eq!(FileReader::read_chunks(&list).await.unwrap().len(), 2);
        let chunks = FileReader::read_chunks(&wrapped).await.unwrap();
        assert_eq!(chunks[0].chunk_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn rejects_unsupported_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("paper.pdf");
        std::fs::write(&pdf, "binary").unwrap();

        assert!(FileReader::read_file(&pdf).await.is_err());
    }
}
