//! The proposer seam.
//!
//! A proposer turns new input text plus the current neighborhood into a
//! full replacement for that neighborhood. Production proposers wrap a
//! language model and run out of process; the curation pipeline treats
//! whatever comes back as untrusted and reconciles it before anything
//! is persisted.

use async_trait::async_trait;

use graft_core::KnowledgeGraph;

use crate::error::Result;

#[async_trait]
pub trait SubgraphProposer: Send + Sync {
    /// Produce a replacement for `neighborhood` that incorporates
    /// `input`. Entities the replacement keeps must be re-emitted;
    /// ids may be reused or invented freely.
    async fn propose(&self, input: &str, neighborhood: &KnowledgeGraph)
        -> Result<KnowledgeGraph>;
}

/// Proposer that returns a pre-built replacement, for pipelines where
/// the proposal was produced out of process and handed in whole.
pub struct StaticProposer {
    proposal: KnowledgeGraph,
}

impl StaticProposer {
    pub fn new(proposal: KnowledgeGraph) -> Self {
        Self { proposal }
    }
}

#[async_trait]
impl SubgraphProposer for StaticProposer {
    async fn propose(
        &self,
        _input: &str,
        _neighborhood: &KnowledgeGraph,
    ) -> Result<KnowledgeGraph> {
        Ok(self.proposal.clone())
    }
}
