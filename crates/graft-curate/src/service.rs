//! The curation service: one background unit of work per request.
//!
//! Each request runs seed selection → neighborhood fetch → proposal →
//! splice. Requests are dispatched as tokio tasks so enqueuing never
//! blocks, a semaphore bounds how many run at once, and every failure
//! is logged and swallowed: nothing propagates back to whoever
//! enqueued the request.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

use graft_core::{ActorId, GraphId};
use graft_store::{neighborhood, GraphStore};

use crate::config::CuratorConfig;
use crate::error::Result;
use crate::propose::SubgraphProposer;
use crate::splice::{SpliceOutcome, SpliceRequest, Splicer};

/// A request to fold new information into one graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationRequest {
    pub graph_id: GraphId,
    pub actor_id: ActorId,
    /// Free text carrying the new information; also drives seed
    /// selection by name match.
    pub input: String,
    /// Neighborhood radius override.
    pub hops: Option<u32>,
}

/// Drives curation requests end to end against one store and proposer.
///
/// Cheap to clone; clones share the store, the splicer (and so its
/// per-graph locks), and the concurrency semaphore.
pub struct CurationService<S, P> {
    store: Arc<S>,
    proposer: Arc<P>,
    splicer: Arc<Splicer<S>>,
    config: CuratorConfig,
    concurrency: Arc<Semaphore>,
}

impl<S, P> Clone for CurationService<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            proposer: self.proposer.clone(),
            splicer: self.splicer.clone(),
            config: self.config.clone(),
            concurrency: self.concurrency.clone(),
        }
    }
}

impl<S, P> CurationService<S, P>
where
    S: GraphStore + 'static,
    P: SubgraphProposer + 'static,
{
    pub fn new(store: Arc<S>, proposer: Arc<P>, config: CuratorConfig) -> Self {
        let concurrency = Arc::new(Semaphore::new(config.max_concurrent_curations));
        Self {
            splicer: Arc::new(Splicer::new(store.clone())),
            store,
            proposer,
            config,
            concurrency,
        }
    }

    /// Dispatch a curation in the background and return immediately.
    /// The handle is for tests and shutdown paths; dropping it is fine.
    pub fn spawn_curation(&self, request: CurationRequest) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let request_id = Uuid::new_v4();
            let _permit = service
                .concurrency
                .acquire()
                .await
                .expect("Semaphore closed");

            if let Err(e) = service.run_single_curation(&request, request_id).await {
                tracing::error!(
                    request_id = %request_id,
                    graph_id = %request.graph_id,
                    error = %e,
                    "Curation failed"
                );
            }
        })
    }

    /// Execute one curation to completion: seeds → neighborhood →
    /// proposal → splice.
    pub async fn run_single_curation(
        &self,
        request: &CurationRequest,
        request_id: Uuid,
    ) -> Result<SpliceOutcome> {
        let hops = request.hops.unwrap_or(self.config.default_hops);

        let full = self.store.fetch_full_graph(&request.graph_id).await?;
        let seeds = neighborhood::relevant_entity_ids(&full, &request.input);
        let old_subgraph = self
            .store
            .fetch_neighborhood(&request.graph_id, &seeds, hops)
            .await?;

        tracing::info!(
            request_id = %request_id,
            graph_id = %request.graph_id,
            seeds = seeds.len(),
            entities = old_subgraph.entities.len(),
            relationships = old_subgraph.relationships.len(),
            "Neighborhood fetched"
        );

        let new_subgraph = self.proposer.propose(&request.input, &old_subgraph).await?;

        let splice_request = SpliceRequest {
            graph_id: request.graph_id.clone(),
            actor_id: request.actor_id.clone(),
            old_subgraph,
            new_subgraph,
        };
        let outcome = self.splicer.splice(&splice_request).await;

        match &outcome {
            SpliceOutcome::Committed { report } => tracing::info!(
                request_id = %request_id,
                graph_id = %request.graph_id,
                entities_added = report.entities_added,
                entities_removed = report.entities_removed,
                unchanged = report.unchanged,
                "Curation complete"
            ),
            SpliceOutcome::Rejected { stage, .. } => tracing::info!(
                request_id = %request_id,
                graph_id = %request.graph_id,
                stage = ?stage,
                "Curation rejected"
            ),
        }

        Ok(outcome)
    }
}
