//! graft-store: Persistence backends and fetch-side queries for the
//! Graft knowledge graph.
//!
//! This crate is the single mutation point for stored knowledge graphs.
//! All reads and writes flow through the [`GraphStore`] trait to keep
//! delta commits and snapshot overwrites consistent, whichever backend
//! is in use.

pub mod fs;
pub mod memory;
pub mod neighborhood;
pub mod store;

pub use fs::FileGraphStore;
pub use memory::MemoryGraphStore;
pub use store::{AppliedDelta, GraphStore, StoreError};
