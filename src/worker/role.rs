use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Role - logical address of a class of work
// ============================================================================
//
// A role names WHAT should happen to a message ("segment-aggregate"), never
// WHERE it happens. The registry decides whether a role is served by a local
// worker or forwarded to the peer that owns it.
//
// ============================================================================

/// Immutable logical identifier naming a class of work
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_role_equality_is_by_name() {
        assert_eq!(Role::new("segment-aggregate"), Role::from("segment-aggregate"));
        assert_ne!(Role::new("segment-aggregate"), Role::new("service-metric-persistence"));
    }

    #[test]
    fn test_role_serializes_as_plain_string() {
        let role = Role::new("segment-aggregate");
        let json = serde_json::to_string(&role).unwrap();
        assert_eq!(json, "\"segment-aggregate\"");

        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, role);
    }

    #[test]
    fn test_role_usable_as_set_key() {
        let mut roles = HashSet::new();
        roles.insert(Role::new("a"));
        roles.insert(Role::new("a"));
        roles.insert(Role::new("b"));
        assert_eq!(roles.len(), 2);
    }
}
