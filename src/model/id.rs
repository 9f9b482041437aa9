use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Identifier of a board or block.
///
/// A `Placeholder` is chosen by the client and only links entities inside a
/// single request; an `Assigned` identifier was issued by the server. Both
/// travel as plain strings on the wire. Anything deserialized from a request
/// body is a placeholder: the server never trusts a client-supplied id as one
/// of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityId {
    Placeholder(String),
    Assigned(String),
}

impl EntityId {
    pub fn placeholder(id: impl Into<String>) -> Self {
        EntityId::Placeholder(id.into())
    }

    pub fn assigned(id: impl Into<String>) -> Self {
        EntityId::Assigned(id.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntityId::Placeholder(id) | EntityId::Assigned(id) => id,
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, EntityId::Assigned(_))
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        EntityId::Placeholder(String::new())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(EntityId::Placeholder)
    }
}

/// Parent links travel as a string where `""` means "no parent".
pub(crate) mod parent_ref {
    use super::EntityId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(parent: &Option<EntityId>, serializer: S) -> Result<S::Ok, S::Error> {
        match parent {
            Some(id) => serializer.serialize_str(id.as_str()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<EntityId>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|id| !id.is_empty()).map(EntityId::Placeholder))
    }
}

/// Kind of server identifier, encoded as its first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Board,
    Card,
    View,
    Block,
}

impl IdKind {
    pub fn prefix(self) -> char {
        match self {
            IdKind::Board => 'b',
            IdKind::Card => 'c',
            IdKind::View => 'v',
            IdKind::Block => 'a',
        }
    }

    pub fn for_block_type(block_type: &str) -> Self {
        match block_type {
            "card" => IdKind::Card,
            "view" => IdKind::View,
            _ => IdKind::Block,
        }
    }
}

/// Source of fresh server identifiers.
pub trait IdGenerator: Send + Sync {
    fn new_id(&self, kind: IdKind) -> String;
}

/// Kind prefix followed by a random v4 UUID.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn new_id(&self, kind: IdKind) -> String {
        format!("{}{}", kind.prefix(), Uuid::new_v4().simple())
    }
}

/// Deterministic identifiers (`b1`, `c2`, `a3`, ...), handy for fixtures.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl IdGenerator for SequentialIds {
    fn new_id(&self, kind: IdKind) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{}", kind.prefix(), n)
    }
}
