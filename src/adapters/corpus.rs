//! Citation and document loading.
//!
//! A place's citations and source documents live outside this crate. The
//! validator only needs the [`CorpusLoader`] seam; the JSONL directory
//! layout below is the on-disk form used by the CLI:
//!
//! ```text
//! <root>/citations/<place_id>.jsonl   one Citation per line
//! <root>/documents/<place_id>.jsonl   one Document per line
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::domain::{Citation, Document};

/// Errors that can occur while loading a place's data
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("No {kind} found for place {place_id}")]
    NotFound { kind: &'static str, place_id: i64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed {kind} record at {path}:{line}: {source}")]
    Parse {
        kind: &'static str,
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of citations and documents per place
#[async_trait]
pub trait CorpusLoader: Send + Sync {
    /// Every place id that has citations
    async fn list_place_ids(&self) -> Result<Vec<i64>, LoadError>;

    /// Citations scraped for a place
    async fn load_citations(&self, place_id: i64) -> Result<Vec<Citation>, LoadError>;

    /// Source documents for a place
    async fn load_documents(&self, place_id: i64) -> Result<Vec<Document>, LoadError>;
}

/// JSONL files grouped by place id under one root directory
#[derive(Debug, Clone)]
pub struct JsonlCorpus {
    root: PathBuf,
}

impl JsonlCorpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn citations_dir(&self) -> PathBuf {
        self.root.join("citations")
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.root.join("documents")
    }

    fn place_file(dir: &Path, place_id: i64) -> PathBuf {
        dir.join(format!("{}.jsonl", place_id))
    }

    async fn read_jsonl<T: DeserializeOwned>(
        path: &Path,
        kind: &'static str,
        place_id: i64,
    ) -> Result<Vec<T>, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound { kind, place_id });
        }

        let file = File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut items = Vec::new();
        let mut line_no = 0;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let item = serde_json::from_str(&line).map_err(|source| LoadError::Parse {
                kind,
                path: path.to_path_buf(),
                line: line_no,
                source,
            })?;
            items.push(item);
        }

        Ok(items)
    }
}

#[async_trait]
impl CorpusLoader for JsonlCorpus {
    async fn list_place_ids(&self) -> Result<Vec<i64>, LoadError> {
        let dir = self.citations_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(".jsonl") {
                    if let Ok(place_id) = stem.parse::<i64>() {
                        ids.push(place_id);
                    }
                }
            }
        }

        ids.sort_unstable();
        Ok(ids)
    }

    async fn load_citations(&self, place_id: i64) -> Result<Vec<Citation>, LoadError> {
        let path = Self::place_file(&self.citations_dir(), place_id);
        Self::read_jsonl(&path, "citations", place_id).await
    }

    async fn load_documents(&self, place_id: i64) -> Result<Vec<Document>, LoadError> {
        let path = Self::place_file(&self.documents_dir(), place_id);
        Self::read_jsonl(&path, "documents", place_id).await
    }
}
