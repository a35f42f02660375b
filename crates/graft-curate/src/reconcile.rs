//! Identity reconciliation between an old neighborhood and its proposed
//! replacement.
//!
//! The proposer only sees a bounded neighborhood and returns a full
//! replacement for it, reusing, inventing, or colliding entity ids at
//! will. Before the replacement can be diffed and spliced, its ids must
//! be brought into the old snapshot's identity space: a reused id whose
//! content no longer matches gets a fresh id, an entity whose content
//! matches an old entity is folded onto the old id, and boundary
//! entities are carried through so edges from the rest of the graph
//! keep resolving.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use graft_core::{fresh_entity_id, EntityId, KnowledgeGraph, Relationship};

/// What identity reconciliation decided, for reporting and logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdentityResolution {
    /// Proposal ids relabeled to fresh ids because they collided with
    /// an old id carrying different content.
    pub relabeled: BTreeMap<EntityId, EntityId>,
    /// Proposal ids folded onto old ids carrying equal content.
    pub unified: BTreeMap<EntityId, EntityId>,
    /// Boundary entities copied into the proposal verbatim.
    pub preserved: BTreeSet<EntityId>,
}

/// Valence entity ids of `old` that the proposal mentions nowhere, as
/// neither an entity nor a relationship endpoint. A non-empty result
/// rejects the whole update: the proposer dropped an entity the rest of
/// the graph still points at.
pub fn missing_valence_ids(old: &KnowledgeGraph, new: &KnowledgeGraph) -> BTreeSet<EntityId> {
    let mentioned = new.mentioned_entity_ids();
    old.valence_entity_ids()
        .into_iter()
        .filter(|id| !mentioned.contains(id))
        .collect()
}

/// Drop relationships whose endpoints cannot resolve, returning the
/// dropped ones.
///
/// An endpoint resolves if it names one of the proposal's own entities
/// or a boundary entity of `old` (those are carried through later, so
/// edges touching them stay valid). Everything else is a hallucinated
/// reference.
pub fn trim_unresolvable_relationships(
    old: &KnowledgeGraph,
    new: &mut KnowledgeGraph,
) -> Vec<Relationship> {
    let mut resolvable = new.entity_ids();
    resolvable.extend(old.valence_entity_ids());

    let mut dropped = Vec::new();
    new.relationships.retain(|rel| {
        let keep = resolvable.contains(&rel.source_entity_id)
            && resolvable.contains(&rel.target_entity_id);
        if !keep {
            dropped.push(rel.clone());
        }
        keep
    });
    dropped
}

/// Bring the proposal's ids into the old snapshot's identity space.
///
/// Runs the three relabeling steps in order: conflicting-id relabels,
/// content-equal unification, boundary carry-through. `old` is never
/// mutated; callers trim unresolvable relationships first.
pub fn reconcile_identities(
    old: &KnowledgeGraph,
    new: &mut KnowledgeGraph,
) -> IdentityResolution {
    let relabeled = conflicting_id_relabels(old, new);
    apply_id_mapping(new, &relabeled);

    let unified = equivalent_entity_relabels(old, new);
    apply_id_mapping(new, &unified);

    let preserved = force_include_valence_entities(old, new);

    IdentityResolution {
        relabeled,
        unified,
        preserved,
    }
}

/// Ids present in both graphs with differing signatures map to fresh
/// ids, so the proposal's record stops shadowing the old one. Fresh ids
/// are checked against both graphs' ids and previously issued ones.
fn conflicting_id_relabels(
    old: &KnowledgeGraph,
    new: &KnowledgeGraph,
) -> BTreeMap<EntityId, EntityId> {
    let mut taken = old.entity_ids();
    taken.extend(new.entity_ids());

    let mut mapping = BTreeMap::new();
    for (id, new_entity) in &new.entities {
        let Some(old_entity) = old.entities.get(id) else {
            continue;
        };
        if old_entity.signature() == new_entity.signature() {
            continue;
        }

        let fresh = loop {
            let candidate = fresh_entity_id(new_entity.primary_name().unwrap_or_default());
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        taken.insert(fresh.clone());
        mapping.insert(id.clone(), fresh);
    }
    mapping
}

/// Proposal entities whose signature equals some old entity's signature
/// map onto that old id. When several old entities share a signature,
/// the one with the lowest id wins, which keeps the outcome
/// reproducible.
fn equivalent_entity_relabels(
    old: &KnowledgeGraph,
    new: &KnowledgeGraph,
) -> BTreeMap<EntityId, EntityId> {
    let mut by_content: HashMap<String, &EntityId> = HashMap::new();
    for (id, entity) in &old.entities {
        by_content.entry(entity.signature().digest()).or_insert(id);
    }

    let mut mapping = BTreeMap::new();
    for (id, entity) in &new.entities {
        if let Some(old_id) = by_content.get(&entity.signature().digest()) {
            if *old_id != id {
                mapping.insert(id.clone(), (*old_id).clone());
            }
        }
    }
    mapping
}

/// Copy every valence entity of `old` into the proposal under its own
/// id, unless the proposal already has that id. Returns the copied ids.
///
/// This can leave a duplicated record when the proposer rewrote a
/// boundary entity's content under a relabeled id; identity takes
/// precedence over deduplication there.
fn force_include_valence_entities(
    old: &KnowledgeGraph,
    new: &mut KnowledgeGraph,
) -> BTreeSet<EntityId> {
    let mut preserved = BTreeSet::new();
    for (id, entity) in &old.entities {
        if entity.has_external_neighbor && !new.entities.contains_key(id) {
            new.entities.insert(id.clone(), entity.clone());
            preserved.insert(id.clone());
        }
    }
    preserved
}

/// Rewrite a graph through an id mapping: move entities to their mapped
/// ids (updating the embedded id) and rewrite relationship endpoints.
/// Identity pairs are skipped; distinct sources mapping to one target
/// collapse to a single entity.
fn apply_id_mapping(graph: &mut KnowledgeGraph, mapping: &BTreeMap<EntityId, EntityId>) {
    if mapping.is_empty() {
        return;
    }

    for (from, to) in mapping {
        if from == to {
            continue;
        }
        if let Some(mut entity) = graph.entities.remove(from) {
            entity.id = to.clone();
            graph.entities.insert(to.clone(), entity);
        }
    }

    for rel in &mut graph.relationships {
        if let Some(to) = mapping.get(&rel.source_entity_id) {
            rel.source_entity_id = to.clone();
        }
        if let Some(to) = mapping.get(&rel.target_entity_id) {
            rel.target_entity_id = to.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_core::Entity;

    fn entity_with_prop(id: &str, name: &str, key: &str, value: &str) -> Entity {
        let mut entity = Entity::new(id, name);
        entity
            .properties
            .insert(key.to_string(), serde_json::json!(value));
        entity
    }

    fn valence_entity(id: &str, name: &str) -> Entity {
        let mut entity = Entity::new(id, name);
        entity.has_external_neighbor = true;
        entity
    }

    #[test]
    fn absent_valence_entities_are_detected() {
        let mut old = KnowledgeGraph::new();
        old.insert_entity(valence_entity("b2", "Bob"));
        old.insert_entity(Entity::new("a1", "Alice"));

        let mut new = KnowledgeGraph::new();
        new.insert_entity(Entity::new("a1", "Alice"));

        assert_eq!(
            missing_valence_ids(&old, &new),
            BTreeSet::from([EntityId::new("b2")])
        );
    }

    #[test]
    fn endpoint_mention_satisfies_the_valence_check() {
        let mut old = KnowledgeGraph::new();
        old.insert_entity(valence_entity("b2", "Bob"));

        let mut new = KnowledgeGraph::new();
        new.insert_entity(Entity::new("a1", "Alice"));
        new.relationships
            .push(Relationship::new("a1", "b2", "KNOWS"));

        assert!(missing_valence_ids(&old, &new).is_empty());
    }

    #[test]
    fn trim_keeps_boundary_edges_and_drops_hallucinated_ones() {
        let mut old = KnowledgeGraph::new();
        old.insert_entity(valence_entity("b2", "Bob"));

        let mut new = KnowledgeGraph::new();
        new.insert_entity(Entity::new("a1", "Alice"));
        new.relationships = vec![
            Relationship::new("a1", "b2", "KNOWS"),
            Relationship::new("a1", "ghost", "KNOWS"),
        ];

        let dropped = trim_unresolvable_relationships(&old, &mut new);
        assert_eq!(new.relationships, vec![Relationship::new("a1", "b2", "KNOWS")]);
        assert_eq!(dropped, vec![Relationship::new("a1", "ghost", "KNOWS")]);
    }

    #[test]
    fn equal_content_unifies_onto_the_old_id() {
        let mut old = KnowledgeGraph::new();
        old.insert_entity(Entity::new("a1", "Alice"));

        let mut new = KnowledgeGraph::new();
        new.insert_entity(Entity::new("z9", "Alice"));
        new.relationships
            .push(Relationship::new("z9", "z9", "KNOWS_SELF"));

        let resolution = reconcile_identities(&old, &mut new);

        assert_eq!(
            resolution.unified,
            BTreeMap::from([(EntityId::new("z9"), EntityId::new("a1"))])
        );
        assert!(new.entities.contains_key(&EntityId::new("a1")));
        assert!(!new.entities.contains_key(&EntityId::new("z9")));
        assert_eq!(new.entities[&EntityId::new("a1")].id, EntityId::new("a1"));
        assert_eq!(
            new.relationships,
            vec![Relationship::new("a1", "a1", "KNOWS_SELF")]
        );
    }

    #[test]
    fn colliding_id_with_new_content_gets_a_fresh_id() {
        let mut old = KnowledgeGraph::new();
        old.insert_entity(entity_with_prop("e1", "Acme Corp", "industry", "mining"));

        let mut new = KnowledgeGraph::new();
        new.insert_entity(entity_with_prop("e1", "Acme Corp", "industry", "aerospace"));
        new.relationships
            .push(Relationship::new("e1", "e1", "OWNS"));

        let resolution = reconcile_identities(&old, &mut new);

        let fresh = resolution
            .relabeled
            .get(&EntityId::new("e1"))
            .expect("collision should relabel");
        assert!(fresh.as_str().starts_with("acme."));
        assert!(new.entities.contains_key(fresh));
        assert!(!new.entities.contains_key(&EntityId::new("e1")));
        // The relabel cascades to both endpoints.
        assert_eq!(
            new.relationships,
            vec![Relationship::new(
                fresh.as_str(),
                fresh.as_str(),
                "OWNS"
            )]
        );
    }

    #[test]
    fn unification_prefers_the_lowest_old_id() {
        let mut old = KnowledgeGraph::new();
        old.insert_entity(Entity::new("a1", "Alice"));
        old.insert_entity(Entity::new("a9", "Alice"));

        let mut new = KnowledgeGraph::new();
        new.insert_entity(Entity::new("z9", "Alice"));

        let resolution = reconcile_identities(&old, &mut new);
        assert_eq!(
            resolution.unified,
            BTreeMap::from([(EntityId::new("z9"), EntityId::new("a1"))])
        );
    }

    #[test]
    fn valence_entities_are_copied_through() {
        let mut old = KnowledgeGraph::new();
        old.insert_entity(valence_entity("b2", "Bob"));
        old.insert_entity(Entity::new("a1", "Alice"));

        let mut new = KnowledgeGraph::new();
        new.insert_entity(Entity::new("a1", "Alice"));

        let resolution = reconcile_identities(&old, &mut new);
        assert_eq!(resolution.preserved, BTreeSet::from([EntityId::new("b2")]));
        assert!(new.entities[&EntityId::new("b2")].has_external_neighbor);
    }

    #[test]
    fn identical_proposal_reconciles_to_a_no_op() {
        let mut old = KnowledgeGraph::new();
        old.insert_entity(Entity::new("a1", "Alice"));
        old.insert_entity(valence_entity("b2", "Bob"));
        old.relationships
            .push(Relationship::new("a1", "b2", "KNOWS"));

        let mut new = old.clone();
        let resolution = reconcile_identities(&old, &mut new);

        assert_eq!(resolution, IdentityResolution::default());
        assert_eq!(new, old);
    }

    #[test]
    fn valence_collision_leaves_a_duplicate_record() {
        // The proposer rewrote a boundary entity's content under its old
        // id. The rewrite gets a fresh id, and the boundary entity is
        // carried through untouched: two records describing one thing.
        let mut old = KnowledgeGraph::new();
        let mut acme = entity_with_prop("e1", "Acme Corp", "industry", "mining");
        acme.has_external_neighbor = true;
        old.insert_entity(acme);

        let mut new = KnowledgeGraph::new();
        new.insert_entity(entity_with_prop("e1", "Acme Corp", "industry", "aerospace"));

        let resolution = reconcile_identities(&old, &mut new);

        let fresh = resolution.relabeled.get(&EntityId::new("e1")).unwrap();
        assert_eq!(resolution.preserved, BTreeSet::from([EntityId::new("e1")]));
        assert_eq!(new.entities.len(), 2);
        assert_eq!(
            new.entities[&EntityId::new("e1")].properties["industry"],
            serde_json::json!("mining")
        );
        assert_eq!(
            new.entities[fresh].properties["industry"],
            serde_json::json!("aerospace")
        );
    }
}
