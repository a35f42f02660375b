//! Subgraph splicing: the orchestrated path from a proposed replacement
//! to a committed delta.
//!
//! Each request moves through a fixed stage order (Validating, Trimming,
//! Reconciling, Diffing, Stamping, IntegrityChecking, Committing) and
//! ends in exactly one terminal state, Committed or Rejected. There are
//! no partial commits: every rejection before Committing leaves the
//! store untouched, and the snapshot is never written when the delta
//! commit failed. Rejections are outcomes, not errors; callers keep
//! going as if no update had been requested.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

use graft_core::{ActorId, EntityId, GraphId, KnowledgeGraph, Relationship};
use graft_store::{AppliedDelta, GraphStore};

use crate::diff;
use crate::reconcile::{self, IdentityResolution};

// ── Requests, Stages & Outcomes ───────────────────────────────────

/// One unit of splice work: the neighborhood as fetched (valence flags
/// populated) and the proposed replacement for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpliceRequest {
    pub graph_id: GraphId,
    pub actor_id: ActorId,
    pub old_subgraph: KnowledgeGraph,
    pub new_subgraph: KnowledgeGraph,
}

/// The stages a splice request moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpliceStage {
    Validating,
    Trimming,
    Reconciling,
    Diffing,
    Stamping,
    IntegrityChecking,
    Committing,
}

/// Why a splice was rejected.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    /// A boundary entity of the old neighborhood is entirely absent
    /// from the proposal.
    MissingValenceEntities { missing: BTreeSet<EntityId> },
    /// The merged graph would contain relationship endpoints that
    /// resolve to no entity.
    DanglingRelationships { entity_ids: BTreeSet<EntityId> },
    /// The store failed. When `delta_committed` is true the journal
    /// holds the delta but the snapshot write failed afterwards; the
    /// journal is authoritative.
    Persistence {
        message: String,
        delta_committed: bool,
    },
}

/// What a committed splice did.
#[derive(Debug, Serialize)]
pub struct SpliceReport {
    pub graph_id: GraphId,
    pub resolution: IdentityResolution,
    pub entities_removed: usize,
    pub relationships_removed: usize,
    pub entities_added: usize,
    pub relationships_added: usize,
    pub applied: AppliedDelta,
    /// True when the reconciled proposal matched the stored
    /// neighborhood and no store call was made.
    pub unchanged: bool,
}

/// Terminal state of one splice request.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SpliceOutcome {
    Committed {
        report: SpliceReport,
    },
    Rejected {
        stage: SpliceStage,
        reason: RejectionReason,
    },
}

impl SpliceOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, SpliceOutcome::Committed { .. })
    }
}

// ── Per-graph Serialization ───────────────────────────────────────

/// Per-graph-id mutex registry. The read-merge-write cycle against one
/// graph runs under its mutex, so concurrent updates to the same graph
/// cannot interleave and lose writes.
#[derive(Default)]
struct GraphLocks {
    inner: Mutex<HashMap<GraphId, Arc<Mutex<()>>>>,
}

impl GraphLocks {
    async fn acquire(&self, graph_id: &GraphId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            locks.entry(graph_id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

// ── Splicer ───────────────────────────────────────────────────────

/// Runs splice requests against a store.
///
/// The splicer owns the per-graph locks, so every caller going through
/// it is serialized per graph id, not just the curation service.
pub struct Splicer<S> {
    store: Arc<S>,
    locks: GraphLocks,
}

impl<S: GraphStore> Splicer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: GraphLocks::default(),
        }
    }

    /// Run one request to a terminal state.
    pub async fn splice(&self, request: &SpliceRequest) -> SpliceOutcome {
        let old = &request.old_subgraph;

        // Validating: every externally connected entity must survive in
        // some form, or the proposal is untrustworthy as a whole.
        let missing = reconcile::missing_valence_ids(old, &request.new_subgraph);
        if !missing.is_empty() {
            tracing::error!(
                graph_id = %request.graph_id,
                missing = ?missing,
                old_subgraph = %graph_json(old),
                new_subgraph = %graph_json(&request.new_subgraph),
                "Proposal drops externally connected entities, rejecting update"
            );
            return SpliceOutcome::Rejected {
                stage: SpliceStage::Validating,
                reason: RejectionReason::MissingValenceEntities { missing },
            };
        }

        // Trimming.
        let mut new = request.new_subgraph.clone();
        let dropped = reconcile::trim_unresolvable_relationships(old, &mut new);
        if !dropped.is_empty() {
            tracing::debug!(
                graph_id = %request.graph_id,
                dropped = dropped.len(),
                "Trimmed relationships with unresolvable endpoints"
            );
        }

        // Reconciling.
        let resolution = reconcile::reconcile_identities(old, &mut new);

        // Diffing, then Stamping (only additions carry provenance).
        let remove = diff::difference(old, &new);
        let add = stamp_provenance(diff::difference(&new, old), &request.actor_id);

        if remove.is_empty() && add.is_empty() {
            tracing::debug!(
                graph_id = %request.graph_id,
                "Reconciled proposal matches the stored neighborhood, nothing to splice"
            );
            return SpliceOutcome::Committed {
                report: SpliceReport {
                    graph_id: request.graph_id.clone(),
                    resolution,
                    entities_removed: 0,
                    relationships_removed: 0,
                    entities_added: 0,
                    relationships_added: 0,
                    applied: AppliedDelta::default(),
                    unchanged: true,
                },
            };
        }

        self.apply(request, remove, add, resolution).await
    }

    /// IntegrityChecking and Committing, under the graph's lock.
    async fn apply(
        &self,
        request: &SpliceRequest,
        remove: KnowledgeGraph,
        add: KnowledgeGraph,
        resolution: IdentityResolution,
    ) -> SpliceOutcome {
        let graph_id = &request.graph_id;
        let _guard = self.locks.acquire(graph_id).await;

        let mut merged = match self.store.fetch_full_graph(graph_id).await {
            Ok(graph) => graph,
            Err(e) => {
                return persistence_rejection(
                    request,
                    &remove,
                    &add,
                    SpliceStage::IntegrityChecking,
                    false,
                    &e.to_string(),
                )
            }
        };

        for id in remove.entities.keys() {
            merged.entities.remove(id);
        }
        let doomed: HashSet<&Relationship> = remove.relationships.iter().collect();
        merged.relationships.retain(|rel| !doomed.contains(rel));

        for (id, entity) in &add.entities {
            merged.entities.insert(id.clone(), entity.clone());
        }
        for rel in &add.relationships {
            if !merged.relationships.contains(rel) {
                merged.relationships.push(rel.clone());
            }
        }

        // IntegrityChecking: the merged graph must not reference
        // entities it does not contain.
        let dangling = merged.dangling_endpoint_ids();
        if !dangling.is_empty() {
            tracing::warn!(
                graph_id = %graph_id,
                entity_ids = ?dangling,
                old_subgraph = %graph_json(&request.old_subgraph),
                new_subgraph = %graph_json(&request.new_subgraph),
                "Splice would leave dangling relationship endpoints, rejecting update"
            );
            return SpliceOutcome::Rejected {
                stage: SpliceStage::IntegrityChecking,
                reason: RejectionReason::DanglingRelationships {
                    entity_ids: dangling,
                },
            };
        }

        // Committing: delta first, snapshot only on commit success.
        let applied = match self.store.commit_delta(graph_id, &remove, &add).await {
            Ok(applied) => applied,
            Err(e) => {
                return persistence_rejection(
                    request,
                    &remove,
                    &add,
                    SpliceStage::Committing,
                    false,
                    &e.to_string(),
                )
            }
        };
        if let Err(e) = self.store.store_snapshot(graph_id, &merged).await {
            return persistence_rejection(
                request,
                &remove,
                &add,
                SpliceStage::Committing,
                true,
                &e.to_string(),
            );
        }

        tracing::info!(
            graph_id = %graph_id,
            entities_removed = remove.entities.len(),
            relationships_removed = remove.relationships.len(),
            entities_added = add.entities.len(),
            relationships_added = add.relationships.len(),
            "Splice committed"
        );

        SpliceOutcome::Committed {
            report: SpliceReport {
                graph_id: graph_id.clone(),
                resolution,
                entities_removed: remove.entities.len(),
                relationships_removed: remove.relationships.len(),
                entities_added: add.entities.len(),
                relationships_added: add.relationships.len(),
                applied,
                unchanged: false,
            },
        }
    }
}

/// Stamp attribution onto every added entity. Timestamps are truncated
/// to whole seconds.
fn stamp_provenance(mut add: KnowledgeGraph, actor_id: &ActorId) -> KnowledgeGraph {
    let now = Utc::now().trunc_subsecs(0);
    for entity in add.entities.values_mut() {
        entity.updated_at = Some(now);
        entity.updated_by = Some(actor_id.clone());
    }
    add
}

fn persistence_rejection(
    request: &SpliceRequest,
    remove: &KnowledgeGraph,
    add: &KnowledgeGraph,
    stage: SpliceStage,
    delta_committed: bool,
    message: &str,
) -> SpliceOutcome {
    tracing::error!(
        graph_id = %request.graph_id,
        error = %message,
        stage = ?stage,
        delta_committed,
        remove = %graph_json(remove),
        add = %graph_json(add),
        old_subgraph = %graph_json(&request.old_subgraph),
        new_subgraph = %graph_json(&request.new_subgraph),
        "Store failure during splice"
    );
    SpliceOutcome::Rejected {
        stage,
        reason: RejectionReason::Persistence {
            message: message.to_string(),
            delta_committed,
        },
    }
}

fn graph_json(graph: &KnowledgeGraph) -> String {
    serde_json::to_string(graph).unwrap_or_else(|_| "<unserializable>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_core::Entity;

    #[test]
    fn stamping_sets_provenance_at_second_precision() {
        let mut add = KnowledgeGraph::new();
        add.insert_entity(Entity::new("a1", "Alice"));

        let stamped = stamp_provenance(add, &ActorId::new("curator-1"));
        let entity = &stamped.entities[&EntityId::new("a1")];
        let stamp = entity.updated_at.expect("stamp set");
        assert_eq!(stamp.timestamp_subsec_nanos(), 0);
        assert_eq!(entity.updated_by, Some(ActorId::new("curator-1")));
    }
}
