//! Entity signatures and fresh-id generation.
//!
//! Two entities are the same real-world thing exactly when their
//! signatures (names plus properties) are structurally equal; entity ids
//! carry no meaning on their own. The digest is a BLAKE3 hash of the
//! canonical JSON encoding, usable as a map key when indexing entities
//! by content.

use rand::Rng;
use serde::Serialize;

use crate::types::{Entity, EntityId};

const ID_PREFIX_LEN: usize = 4;
const ID_SUFFIX_LEN: usize = 4;
const ID_SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// The identity-independent content of an entity.
///
/// Name order matters: `["Alice", "Al"]` and `["Al", "Alice"]` are
/// different signatures.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Signature<'a> {
    pub names: &'a [String],
    pub properties: &'a serde_json::Map<String, serde_json::Value>,
}

impl Signature<'_> {
    /// Hex-encoded BLAKE3 digest of the canonical JSON encoding.
    ///
    /// serde_json keeps object keys sorted, so structurally equal
    /// signatures always produce the same digest.
    pub fn digest(&self) -> String {
        let json = serde_json::to_vec(self).expect("Signature serialization should not fail");
        blake3::hash(&json).to_hex().to_string()
    }
}

impl Entity {
    pub fn signature(&self) -> Signature<'_> {
        Signature {
            names: &self.names,
            properties: &self.properties,
        }
    }
}

/// Generate a fresh entity id from a primary name.
///
/// Format: the name's alphanumeric characters, lowercased and truncated
/// to four, then a dot, then four random lowercase-alphanumeric
/// characters (`"Ally Inc." -> "ally.9f2k"`). A name with no
/// alphanumeric characters yields an empty prefix. Uniqueness is only
/// probabilistic; callers that need local uniqueness retry against
/// their own id sets.
pub fn fresh_entity_id(primary_name: &str) -> EntityId {
    let prefix: String = primary_name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(ID_PREFIX_LEN)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_SUFFIX_ALPHABET[rng.gen_range(0..ID_SUFFIX_ALPHABET.len())] as char)
        .collect();

    EntityId::new(format!("{prefix}.{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_content_means_equal_signature() {
        let a = Entity::new("a1", "Alice");
        let b = Entity::new("z9", "Alice");
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.signature().digest(), b.signature().digest());
    }

    #[test]
    fn property_change_breaks_signature() {
        let a = Entity::new("a1", "Alice");
        let mut b = Entity::new("a1", "Alice");
        b.properties
            .insert("role".to_string(), serde_json::json!("buyer"));
        assert_ne!(a.signature(), b.signature());
        assert_ne!(a.signature().digest(), b.signature().digest());
    }

    #[test]
    fn name_order_is_significant() {
        let mut a = Entity::new("a1", "Alice");
        a.names.push("Al".to_string());
        let mut b = Entity::new("a1", "Al");
        b.names.push("Alice".to_string());
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn fresh_id_format() {
        let id = fresh_entity_id("Ally Industries");
        let (prefix, suffix) = id.as_str().split_once('.').unwrap();
        assert_eq!(prefix, "ally");
        assert_eq!(suffix.len(), 4);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn fresh_id_strips_punctuation_and_truncates() {
        let id = fresh_entity_id("A.C.M.E. Corporation");
        assert!(id.as_str().starts_with("acme."));
    }

    #[test]
    fn fresh_id_tolerates_unusable_names() {
        let id = fresh_entity_id("平仮名");
        assert!(id.as_str().starts_with('.'));
        assert_eq!(id.as_str().len(), 1 + ID_SUFFIX_LEN);
    }

    #[test]
    fn fresh_ids_are_distinct() {
        let a = fresh_entity_id("Alice");
        let b = fresh_entity_id("Alice");
        assert_ne!(a, b);
    }
}
