//! graft-curate: Reconciliation and splice engine for Graft graphs.
//!
//! Takes proposed replacement subgraphs from an untrusted proposer,
//! reconciles their entity identities against the authoritative graph,
//! and splices the surviving changes in atomically per graph.

pub mod config;
pub mod describe;
pub mod diff;
pub mod error;
pub mod propose;
pub mod reconcile;
pub mod service;
pub mod splice;
