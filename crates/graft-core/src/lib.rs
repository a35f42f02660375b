//! graft-core: Shared types and identity helpers for the Graft platform.
//!
//! This crate provides the foundational types used across all Graft
//! components:
//! - Entity and Relationship types for the knowledge graph
//! - Graph snapshot type with the set helpers reconciliation needs
//! - Entity signatures (content-based identity) and digesting
//! - Fresh entity-id generation

pub mod signature;
pub mod types;

pub use signature::{fresh_entity_id, Signature};
pub use types::{ActorId, Entity, EntityId, GraphId, KnowledgeGraph, Relationship};
