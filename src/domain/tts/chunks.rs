use super::error::ChunkProcessorError;
use std::path::{Path, PathBuf};

/// Artifact name for the chunk at 0-based `index`: `chunk_0001.wav` for the first.
pub fn chunk_file_name(index: usize) -> String {
    format!("chunk_{:04}.wav", index + 1)
}

pub fn chunk_output_path(output_dir: &Path, index: usize) -> PathBuf {
    output_dir.join(chunk_file_name(index))
}

/// Reads a chunks file: a JSON array of strings, one element per chunk.
pub async fn read_chunks_file(path: &Path) -> Result<Vec<String>, ChunkProcessorError> {
    if path.as_os_str().is_empty() {
        return Err(ChunkProcessorError::Invalid(
            "chunks file path cannot be empty".to_string(),
        ));
    }

    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ChunkProcessorError::ChunksFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    parse_chunks(&contents).map_err(|e| match e {
        ParseChunksError::Empty => {
            ChunkProcessorError::Invalid(format!("no chunks found in {}", path.display()))
        }
        ParseChunksError::Malformed(message) => ChunkProcessorError::ChunksFile {
            path: path.to_path_buf(),
            message,
        },
    })
}

enum ParseChunksError {
    Empty,
    Malformed(String),
}

fn parse_chunks(contents: &str) -> Result<Vec<String>, ParseChunksError> {
    let chunks: Vec<String> = serde_json::from_str(contents)
        .map_err(|e| ParseChunksError::Malformed(format!("invalid JSON: {}", e)))?;

    if chunks.is_empty() {
        return Err(ParseChunksError::Empty);
    }

    Ok(chunks)
}
