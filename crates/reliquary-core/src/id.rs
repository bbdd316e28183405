use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;
use uuid::Uuid;

new_key_type! {
    /// Identifies a live entity in a host world.
    pub struct EntityId;

    /// Identifies a player or AI controller in a host world.
    pub struct ControllerId;
}

/// Identifies a type descriptor in the registry. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

/// Caller-assigned stable identity used to match a saved record to a live
/// entity. The nil value means "no identity".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersistentId(pub Uuid);

impl PersistentId {
    pub const NONE: Self = Self(Uuid::nil());

    /// A fresh random identity.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn is_none(&self) -> bool {
        self.0.is_nil()
    }

    pub fn is_some(&self) -> bool {
        !self.is_none()
    }
}

impl Default for PersistentId {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for PersistentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_identity_is_none() {
        assert!(PersistentId::default().is_none());
        assert!(!PersistentId::NONE.is_some());
    }

    #[test]
    fn identity_bytes_are_stable() {
        let id = PersistentId::from_u128(0x0102);
        let copy = PersistentId::from_bytes(*id.as_bytes());
        assert_eq!(id, copy);
        assert!(id.is_some());
    }

    #[test]
    fn random_identities_differ() {
        assert_ne!(PersistentId::random(), PersistentId::random());
    }

    #[test]
    fn type_ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(TypeId(0), "crate");
        map.insert(TypeId(1), "barrel");
        assert_eq!(map[&TypeId(1)], "barrel");
    }
}
