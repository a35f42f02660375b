//! Fetch-side graph queries: neighborhood extraction, valence marking,
//! and seed selection.
//!
//! A neighborhood is the bounded subgraph handed to the proposer. The
//! valence flag on its members is what later lets the reconciler protect
//! the boundary, so it is recomputed on every extraction and never
//! carried over from stored data.

use std::collections::{BTreeMap, BTreeSet};

use rand::seq::IteratorRandom;

use graft_core::{EntityId, KnowledgeGraph};

/// Undirected adjacency over a snapshot's relationships, restricted to
/// endpoints that resolve to entities.
fn adjacency(graph: &KnowledgeGraph) -> BTreeMap<&EntityId, BTreeSet<&EntityId>> {
    let mut adjacent: BTreeMap<&EntityId, BTreeSet<&EntityId>> = BTreeMap::new();
    for rel in &graph.relationships {
        adjacent
            .entry(&rel.source_entity_id)
            .or_default()
            .insert(&rel.target_entity_id);
        adjacent
            .entry(&rel.target_entity_id)
            .or_default()
            .insert(&rel.source_entity_id);
    }
    adjacent
}

/// Extract the subgraph within `hops` undirected hops of `seeds`.
///
/// Includes every entity reachable in at most `hops` steps, every
/// relationship between included entities, and valence flags computed
/// against `full`. Seeds that do not exist in `full` are ignored; with
/// `hops == 0` the result is the seed entities alone.
pub fn extract_neighborhood(
    full: &KnowledgeGraph,
    seeds: &BTreeSet<EntityId>,
    hops: u32,
) -> KnowledgeGraph {
    let adjacent = adjacency(full);

    let mut members: BTreeSet<&EntityId> = seeds
        .iter()
        .filter(|id| full.entities.contains_key(*id))
        .collect();
    let mut frontier = members.clone();

    for _ in 0..hops {
        let mut next: BTreeSet<&EntityId> = BTreeSet::new();
        for id in &frontier {
            let Some(neighbors) = adjacent.get(*id) else {
                continue;
            };
            for neighbor in neighbors {
                if full.entities.contains_key(*neighbor) && members.insert(*neighbor) {
                    next.insert(*neighbor);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    let mut neighborhood = KnowledgeGraph::new();
    for id in &members {
        if let Some(entity) = full.entities.get(*id) {
            neighborhood.insert_entity(entity.clone());
        }
    }
    neighborhood.relationships = full
        .relationships
        .iter()
        .filter(|r| members.contains(&r.source_entity_id) && members.contains(&r.target_entity_id))
        .cloned()
        .collect();

    mark_external_neighbors(&mut neighborhood, full);
    neighborhood
}

/// Recompute `has_external_neighbor` for every neighborhood member: true
/// iff the member has at least one neighbor in `full`, via an edge in
/// either direction, that is not itself in the neighborhood. Stale flags
/// on the input are overwritten.
pub fn mark_external_neighbors(neighborhood: &mut KnowledgeGraph, full: &KnowledgeGraph) {
    let members = neighborhood.entity_ids();
    let mut boundary: BTreeSet<EntityId> = BTreeSet::new();

    for rel in &full.relationships {
        let source_in = members.contains(&rel.source_entity_id);
        let target_in = members.contains(&rel.target_entity_id);
        if source_in && !target_in {
            boundary.insert(rel.source_entity_id.clone());
        }
        if target_in && !source_in {
            boundary.insert(rel.target_entity_id.clone());
        }
    }

    for entity in neighborhood.entities.values_mut() {
        entity.has_external_neighbor = boundary.contains(&entity.id);
    }
}

/// Entities whose name occurs, case-insensitively, inside the query
/// text. This is the exact-match seed selector; semantic search is a
/// separate concern layered on top by callers that have it.
pub fn relevant_entity_ids(graph: &KnowledgeGraph, query: &str) -> BTreeSet<EntityId> {
    let query = query.to_lowercase();
    graph
        .entities
        .values()
        .filter(|e| {
            e.names
                .iter()
                .any(|name| !name.is_empty() && query.contains(&name.to_lowercase()))
        })
        .map(|e| e.id.clone())
        .collect()
}

/// Uniformly random entity id, for exploratory neighborhood sampling.
pub fn random_seed(graph: &KnowledgeGraph) -> Option<EntityId> {
    let mut rng = rand::thread_rng();
    graph.entities.keys().choose(&mut rng).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_core::{Entity, Relationship};

    /// a1 - b2 - c3 - d4 chain plus an e5 - b2 edge.
    fn chain_graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        for (id, name) in [
            ("a1", "Alice"),
            ("b2", "Bob"),
            ("c3", "Carol"),
            ("d4", "Dave"),
            ("e5", "Erin"),
        ] {
            graph.insert_entity(Entity::new(id, name));
        }
        graph.relationships = vec![
            Relationship::new("a1", "b2", "KNOWS"),
            Relationship::new("b2", "c3", "KNOWS"),
            Relationship::new("c3", "d4", "KNOWS"),
            Relationship::new("e5", "b2", "MANAGES"),
        ];
        graph
    }

    fn seeds(ids: &[&str]) -> BTreeSet<EntityId> {
        ids.iter().map(|id| EntityId::new(*id)).collect()
    }

    #[test]
    fn one_hop_includes_direct_neighbors_only() {
        let neighborhood = extract_neighborhood(&chain_graph(), &seeds(&["b2"]), 1);
        assert_eq!(neighborhood.entity_ids(), seeds(&["a1", "b2", "c3", "e5"]));
        // c3 - d4 crosses the boundary and is excluded.
        assert_eq!(neighborhood.relationships.len(), 3);
    }

    #[test]
    fn two_hops_follow_edges_in_both_directions() {
        let neighborhood = extract_neighborhood(&chain_graph(), &seeds(&["a1"]), 2);
        assert_eq!(neighborhood.entity_ids(), seeds(&["a1", "b2", "c3", "e5"]));
    }

    #[test]
    fn zero_hops_returns_seeds_alone() {
        let neighborhood = extract_neighborhood(&chain_graph(), &seeds(&["a1", "c3"]), 0);
        assert_eq!(neighborhood.entity_ids(), seeds(&["a1", "c3"]));
        assert!(neighborhood.relationships.is_empty());
    }

    #[test]
    fn unknown_seeds_are_ignored() {
        let neighborhood = extract_neighborhood(&chain_graph(), &seeds(&["b2", "ghost"]), 1);
        assert!(!neighborhood.entities.contains_key(&EntityId::new("ghost")));
    }

    #[test]
    fn boundary_members_are_marked() {
        let neighborhood = extract_neighborhood(&chain_graph(), &seeds(&["b2"]), 1);
        // c3 still connects outward to d4; the others are interior.
        assert_eq!(neighborhood.valence_entity_ids(), seeds(&["c3"]));
    }

    #[test]
    fn marking_overwrites_stale_flags() {
        let full = chain_graph();
        let mut neighborhood = full.clone();
        for entity in neighborhood.entities.values_mut() {
            entity.has_external_neighbor = true;
        }
        // The whole graph has no outside, so every flag must clear.
        mark_external_neighbors(&mut neighborhood, &full);
        assert!(neighborhood.valence_entity_ids().is_empty());
    }

    #[test]
    fn relevance_matches_names_inside_query() {
        let graph = chain_graph();
        let ids = relevant_entity_ids(&graph, "What does BOB think of Carol?");
        assert_eq!(ids, seeds(&["b2", "c3"]));
    }

    #[test]
    fn random_seed_comes_from_the_graph() {
        let graph = chain_graph();
        let seed = random_seed(&graph).unwrap();
        assert!(graph.entities.contains_key(&seed));
        assert_eq!(random_seed(&KnowledgeGraph::new()), None);
    }
}
