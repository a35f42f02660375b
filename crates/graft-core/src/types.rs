//! Core domain types for the Graft knowledge graph.
//!
//! These types model the authoritative entity-relationship graph and the
//! neighborhood snapshots exchanged with the subgraph proposer, shared
//! across all Graft services.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identifiers ───────────────────────────────────────────────────

/// Unique identifier for an entity within one knowledge graph.
///
/// Entity ids are free-form strings: the proposer may reuse, invent, or
/// collide them, and the reconciler rewrites them as needed. Generated
/// ids follow the `{name prefix}.{random suffix}` format (see
/// [`crate::signature::fresh_entity_id`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the principal a mutation is attributed to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one knowledge graph in a multi-graph store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct GraphId(pub String);

impl GraphId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Entities & Relationships ──────────────────────────────────────

/// A node in the knowledge graph.
///
/// `names` is ordered: the first element is the primary name, the rest
/// are aliases. `has_external_neighbor` is derived per neighborhood
/// fetch and never trusted across fetches; it marks entities on the
/// boundary of a neighborhood (at least one neighbor outside it).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub names: Vec<String>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_by: Option<ActorId>,
    #[serde(default)]
    pub has_external_neighbor: bool,
}

impl Entity {
    /// Bare entity with a name and no properties or provenance.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(id),
            names: vec![name.into()],
            properties: serde_json::Map::new(),
            updated_at: None,
            updated_by: None,
            has_external_neighbor: false,
        }
    }

    pub fn primary_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }
}

/// A directed, labeled edge between two entities.
///
/// Identity is the full (source, target, label) triple: the graph is a
/// multi-graph, and the same ordered pair may carry several labels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Relationship {
    pub source_entity_id: EntityId,
    pub target_entity_id: EntityId,
    pub label: String,
}

impl Relationship {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            source_entity_id: EntityId::new(source),
            target_entity_id: EntityId::new(target),
            label: label.into(),
        }
    }

    /// Whether `id` is either endpoint of this relationship.
    pub fn touches(&self, id: &EntityId) -> bool {
        &self.source_entity_id == id || &self.target_entity_id == id
    }
}

// ── Graph Snapshots ───────────────────────────────────────────────

/// A snapshot of a knowledge graph or of one of its neighborhoods.
///
/// Entities are keyed by id (unique within a snapshot); the map's
/// ascending-id iteration order is what makes reconciliation
/// deterministic. Relationship order carries no meaning.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeGraph {
    #[serde(default)]
    pub entities: BTreeMap<EntityId, Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }

    /// Insert an entity under its own id, replacing any previous record.
    pub fn insert_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.id.clone(), entity);
    }

    pub fn entity_ids(&self) -> BTreeSet<EntityId> {
        self.entities.keys().cloned().collect()
    }

    /// Every id that appears as a relationship endpoint.
    pub fn endpoint_ids(&self) -> BTreeSet<EntityId> {
        self.relationships
            .iter()
            .flat_map(|r| [r.source_entity_id.clone(), r.target_entity_id.clone()])
            .collect()
    }

    /// Every id the snapshot mentions, as an entity or as an endpoint.
    pub fn mentioned_entity_ids(&self) -> BTreeSet<EntityId> {
        let mut ids = self.entity_ids();
        ids.extend(self.endpoint_ids());
        ids
    }

    /// Ids of entities marked as touching the graph outside this
    /// neighborhood.
    pub fn valence_entity_ids(&self) -> BTreeSet<EntityId> {
        self.entities
            .values()
            .filter(|e| e.has_external_neighbor)
            .map(|e| e.id.clone())
            .collect()
    }

    /// Relationship endpoints that do not resolve to an entity in this
    /// snapshot. A non-empty result on the authoritative graph is an
    /// integrity violation.
    pub fn dangling_endpoint_ids(&self) -> BTreeSet<EntityId> {
        let entity_ids = self.entity_ids();
        self.endpoint_ids()
            .into_iter()
            .filter(|id| !entity_ids.contains(id))
            .collect()
    }
}
