//! Prose rendering of a neighborhood.
//!
//! Used to expand a query with graph context before handing it to a
//! language model: one line per entity fact, then one line per
//! relationship with endpoints resolved to primary names.

use graft_core::{EntityId, KnowledgeGraph};

pub fn describe_neighborhood(graph: &KnowledgeGraph) -> String {
    let mut lines = Vec::new();

    for entity in graph.entities.values() {
        let Some(name) = entity.primary_name() else {
            continue;
        };
        if !entity.properties.is_empty() {
            let props = serde_json::to_string(&entity.properties)
                .expect("property serialization should not fail");
            lines.push(format!("{name} has properties: {props}"));
        }
        if entity.names.len() > 1 {
            lines.push(format!(
                "{name} is also known as: {}",
                entity.names[1..].join(", ")
            ));
        }
    }

    for rel in &graph.relationships {
        lines.push(format!(
            "{} {} {}",
            display_name(graph, &rel.source_entity_id),
            rel.label,
            display_name(graph, &rel.target_entity_id)
        ));
    }

    lines.join("\n")
}

/// Primary name of the entity, or the raw id when it does not resolve.
fn display_name(graph: &KnowledgeGraph, id: &EntityId) -> String {
    graph
        .entities
        .get(id)
        .and_then(|e| e.primary_name())
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_core::{Entity, Relationship};

    #[test]
    fn renders_facts_aliases_and_relationships() {
        let mut graph = KnowledgeGraph::new();
        let mut alice = Entity::new("a1", "Alice");
        alice.names.push("Al".to_string());
        alice
            .properties
            .insert("role".to_string(), serde_json::json!("buyer"));
        graph.insert_entity(alice);
        graph.insert_entity(Entity::new("b2", "Bob"));
        graph
            .relationships
            .push(Relationship::new("a1", "b2", "works with"));

        let prose = describe_neighborhood(&graph);
        let lines: Vec<&str> = prose.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"Alice has properties: {"role":"buyer"}"#,
                "Alice is also known as: Al",
                "Alice works with Bob",
            ]
        );
    }

    #[test]
    fn unresolved_endpoints_fall_back_to_the_id() {
        let mut graph = KnowledgeGraph::new();
        graph.insert_entity(Entity::new("a1", "Alice"));
        graph
            .relationships
            .push(Relationship::new("a1", "ghost", "mentions"));

        assert_eq!(describe_neighborhood(&graph), "Alice mentions ghost");
    }
}
