//! In-memory graph store, for tests and single-process deployments.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use graft_core::{GraphId, KnowledgeGraph, Relationship};

use crate::store::{AppliedDelta, GraphStore, StoreError};

/// Keeps every graph in a process-local map. Delta commits and snapshot
/// writes both mutate the same map, so after a commit-then-snapshot
/// sequence the snapshot is authoritative (as it is for every backend).
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    graphs: RwLock<HashMap<GraphId, KnowledgeGraph>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a graph directly, bypassing the delta path. Test setup and
    /// bulk imports only.
    pub async fn load(&self, graph_id: &GraphId, graph: KnowledgeGraph) {
        self.graphs.write().await.insert(graph_id.clone(), graph);
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn fetch_full_graph(&self, graph_id: &GraphId) -> Result<KnowledgeGraph, StoreError> {
        let graphs = self.graphs.read().await;
        Ok(graphs.get(graph_id).cloned().unwrap_or_default())
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

        let mut graphs = self.graphs.write().await;
        let graph = graphs.entry(graph_id.clone()).or_default();
        let mut applied = AppliedDelta::default();

        for id in remove.entities.keys() {
            if graph.entities.remove(id).is_some() {
                applied.entities_deleted += 1;
            }
        }

        let doomed: HashSet<&Relationship> = remove.relationships.iter().collect();
        let before = graph.relationships.len();
        graph.relationships.retain(|r| !doomed.contains(r));
        applied.relationships_deleted = before - graph.relationships.len();

        for (id, entity) in &add.entities {
            graph.entities.insert(id.clone(), entity.clone());
            applied.entities_upserted += 1;
        }
        for rel in &add.relationships {
            if !graph.relationships.contains(rel) {
                graph.relationships.push(rel.clone());
            }
            applied.relationships_upserted += 1;
        }

        Ok(applied)
    }

    async fn store_snapshot(
        &self,
        graph_id: &GraphId,
        graph: &KnowledgeGraph,
    ) -> Result<(), StoreError> {
        let mut graphs = self.graphs.write().await;
        graphs.insert(graph_id.clone(), graph.clone());
        Ok(())
    }
}
