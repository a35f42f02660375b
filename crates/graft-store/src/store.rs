//! The storage contract shared by all graph backends.
//!
//! A backend holds one authoritative [`KnowledgeGraph`] per graph id and
//! exposes two write paths: a row-level delta commit (the transactional
//! record of what changed) and a whole-snapshot overwrite. The splicer
//! always commits the delta first and writes the snapshot only when the
//! commit succeeded.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use graft_core::{EntityId, GraphId, KnowledgeGraph};

use crate::neighborhood;

/// Errors from graph storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid graph id: {0:?}")]
    InvalidGraphId(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Row counts for a committed delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDelta {
    pub entities_deleted: usize,
    pub relationships_deleted: usize,
    pub entities_upserted: usize,
    pub relationships_upserted: usize,
}

impl AppliedDelta {
    /// Counts for a remove/add pair, before any backend applies it.
    pub fn from_deltas(remove: &KnowledgeGraph, add: &KnowledgeGraph) -> Self {
        Self {
            entities_deleted: remove.entities.len(),
            relationships_deleted: remove.relationships.len(),
            entities_upserted: add.entities.len(),
            relationships_upserted: add.relationships.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Trait for knowledge-graph persistence backends.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Fetch the full authoritative graph. Unknown graph ids read as an
    /// empty graph.
    async fn fetch_full_graph(&self, graph_id: &GraphId) -> Result<KnowledgeGraph, StoreError>;

    /// Fetch the seed entities plus `hops` rings of adjacency, with
    /// `has_external_neighbor` populated relative to the returned
    /// neighborhood. Seeds absent from the graph are ignored.
    async fn fetch_neighborhood(
        &self,
        graph_id: &GraphId,
        seeds: &BTreeSet<EntityId>,
        hops: u32,
    ) -> Result<KnowledgeGraph, StoreError> {
        let full = self.fetch_full_graph(graph_id).await?;
        Ok(neighborhood::extract_neighborhood(&full, seeds, hops))
    }

    /// Atomically apply a remove/add delta pair: delete `remove`'s
    /// entities by id and its relationships by full triple, then upsert
    /// `add`'s entities and relationships. An empty delta is a no-op.
    async fn commit_delta(
        &self,
        graph_id: &GraphId,
        remove: &KnowledgeGraph,
        add: &KnowledgeGraph,
    ) -> Result<AppliedDelta, StoreError>;

    /// Overwrite the stored snapshot. Callers invoke this only after a
    /// successful [`Self::commit_delta`].
    async fn store_snapshot(
        &self,
        graph_id: &GraphId,
        graph: &KnowledgeGraph,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_core::Entity;

    #[test]
    fn applied_delta_counts() {
        let mut remove = KnowledgeGraph::new();
        remove.insert_entity(Entity::new("a1", "Alice"));
        let add = KnowledgeGraph::new();

        let applied = AppliedDelta::from_deltas(&remove, &add);
        assert_eq!(applied.entities_deleted, 1);
        assert_eq!(applied.entities_upserted, 0);
        assert!(!applied.is_empty());
        assert!(AppliedDelta::default().is_empty());
    }
}
