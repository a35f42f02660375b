//! Graph differencing.
//!
//! Run after identity reconciliation, so that equal ids imply equal
//! content and the difference reduces to set membership.

use std::collections::HashSet;

use graft_core::{KnowledgeGraph, Relationship};

/// Everything in `g1` that is absent from `g2`: entities by id,
/// relationships by full-triple value.
///
/// Entities are compared by id alone. Provenance-only differences do
/// not count as changes.
pub fn difference(g1: &KnowledgeGraph, g2: &KnowledgeGraph) -> KnowledgeGraph {
    let mut result = KnowledgeGraph::new();

    for (id, entity) in &g1.entities {
        if !g2.entities.contains_key(id) {
            result.entities.insert(id.clone(), entity.clone());
        }
    }

    let present: HashSet<&Relationship> = g2.relationships.iter().collect();
    result.relationships = g1
        .relationships
        .iter()
        .filter(|rel| !present.contains(rel))
        .cloned()
        .collect();

    result
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use graft_core::{Entity, EntityId};

    fn graph(entity_ids: &[&str], rels: &[(&str, &str, &str)]) -> KnowledgeGraph {
        let mut g = KnowledgeGraph::new();
        for id in entity_ids {
            g.insert_entity(Entity::new(*id, format!("name-{id}")));
        }
        for (src, tgt, label) in rels {
            g.relationships.push(Relationship::new(*src, *tgt, *label));
        }
        g
    }

    #[test]
    fn shared_elements_appear_in_neither_direction() {
        let g1 = graph(&["a1", "b2"], &[("a1", "b2", "KNOWS")]);
        let g2 = graph(&["b2", "c3"], &[("a1", "b2", "KNOWS")]);

        let forward = difference(&g1, &g2);
        let backward = difference(&g2, &g1);

        assert_eq!(forward.entity_ids(), BTreeSet::from([EntityId::new("a1")]));
        assert!(forward.relationships.is_empty());
        assert_eq!(backward.entity_ids(), BTreeSet::from([EntityId::new("c3")]));
        assert!(backward.relationships.is_empty());
    }

    #[test]
    fn relationship_difference_is_label_sensitive() {
        let g1 = graph(&["a1", "b2"], &[("a1", "b2", "KNOWS"), ("a1", "b2", "EMPLOYS")]);
        let g2 = graph(&["a1", "b2"], &[("a1", "b2", "KNOWS")]);

        let removed = difference(&g1, &g2);
        assert_eq!(
            removed.relationships,
            vec![Relationship::new("a1", "b2", "EMPLOYS")]
        );
        assert!(removed.entities.is_empty());
    }

    #[test]
    fn identical_graphs_diff_to_empty() {
        let g = graph(&["a1", "b2"], &[("a1", "b2", "KNOWS")]);
        assert!(difference(&g, &g.clone()).is_empty());
    }

    #[test]
    fn entity_content_changes_do_not_register_without_id_changes() {
        let mut g1 = graph(&["a1"], &[]);
        let g2 = g1.clone();
        g1.entities
            .get_mut(&EntityId::new("a1"))
            .unwrap()
            .properties
            .insert("role".to_string(), serde_json::json!("buyer"));

        // Same id on both sides: the diff is blind to the content edit.
        assert!(difference(&g1, &g2).is_empty());
        assert!(difference(&g2, &g1).is_empty());
    }
}
