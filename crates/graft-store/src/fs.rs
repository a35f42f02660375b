//! File-backed graph store.
//!
//! Graphs are stored as JSON files under a root directory:
//! ```text
//! {root}/
//!   {graph_id}.json          current snapshot
//!   {graph_id}.deltas.jsonl  append-only commit journal
//! ```
//! A missing snapshot reads as an empty graph. Snapshot writes go
//! through a temp file and rename; a delta commit is one appended
//! journal line, so a commit either lands whole or not at all.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use graft_core::{GraphId, KnowledgeGraph};

use crate::store::{AppliedDelta, GraphStore, StoreError};

/// One committed delta, as appended to the journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaRecord {
    pub committed_at: DateTime<Utc>,
    pub remove: KnowledgeGraph,
    pub add: KnowledgeGraph,
}

/// File-system backed graph store.
pub struct FileGraphStore {
    root: PathBuf,
}

impl FileGraphStore {
    /// Create a store rooted at the given directory, creating it if it
    /// doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn snapshot_path(&self, graph_id: &GraphId) -> Result<PathBuf, StoreError> {
        let id = validate_graph_id(graph_id)?;
        Ok(self.root.join(format!("{id}.json")))
    }

    fn journal_path(&self, graph_id: &GraphId) -> Result<PathBuf, StoreError> {
        let id = validate_graph_id(graph_id)?;
        Ok(self.root.join(format!("{id}.deltas.jsonl")))
    }

    /// Read back every committed delta, oldest first. A graph with no
    /// commits has an empty journal.
    pub async fn read_journal(&self, graph_id: &GraphId) -> Result<Vec<DeltaRecord>, StoreError> {
        let path = self.journal_path(graph_id)?;
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| Ok(serde_json::from_str(line)?))
            .collect()
    }
}

/// Graph ids become file names, so anything path-like is rejected.
fn validate_graph_id(graph_id: &GraphId) -> Result<&str, StoreError> {
    let id = graph_id.as_str();
    let safe = !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if safe {
        Ok(id)
    } else {
        Err(StoreError::InvalidGraphId(id.to_string()))
    }
}

#[async_trait]
impl GraphStore for FileGraphStore {
    async fn fetch_full_graph(&self, graph_id: &GraphId) -> Result<KnowledgeGraph, StoreError> {
        let path = self.snapshot_path(graph_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(graph_id = %graph_id, "No stored snapshot, reading empty graph");
                Ok(KnowledgeGraph::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn commit_delta(
        &self,
        graph_id: &GraphId,
        remove: &KnowledgeGraph,
        add: &KnowledgeGraph,
    ) -> Result<AppliedDelta, StoreError> {
        if remove.is_empty() && add.is_empty() {
            return Ok(AppliedDelta::default());
        }

        let record = DeltaRecord {
            committed_at: Utc::now(),
            remove: remove.clone(),
            add: add.clone(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let path = self.journal_path(graph_id)?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(
            graph_id = %graph_id,
            path = %path.display(),
            "Delta committed to journal"
        );

        Ok(AppliedDelta::from_deltas(remove, add))
    }

    async fn store_snapshot(
        &self,
        graph_id: &GraphId,
        graph: &KnowledgeGraph,
    ) -> Result<(), StoreError> {
        let path = self.snapshot_path(graph_id)?;
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(graph)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(
            graph_id = %graph_id,
            path = %path.display(),
            entities = graph.entities.len(),
            relationships = graph.relationships.len(),
            "Snapshot stored"
        );

        Ok(())
    }
}
