//! # Actors and Roles
//!
//! Every engine operation receives an explicit [`Actor`]: who is calling and
//! with which role. There is no ambient session state.

use serde::{Deserialize, Serialize};

use crate::identity::ActorId;

/// Role of an authenticated actor, ordered by privilege.
///
/// `Exporter < Validator < Admin`. A check for `Validator` also admits
/// `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Submits dossiers for their own products.
    Exporter,
    /// Reviews documents and decides cases.
    Validator,
    /// Full access, including payment confirmation.
    Admin,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exporter => "exporter",
            Self::Validator => "validator",
            Self::Admin => "admin",
        }
    }

    /// Parse a role name, case-insensitively.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "exporter" => Some(Self::Exporter),
            "validator" => Some(Self::Validator),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller of an engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor identifier. For exporters this is the case owner id.
    pub id: ActorId,
    /// Role under which the actor is acting.
    pub role: Role,
}

impl Actor {
    /// An exporter acting on their own dossier.
    pub fn exporter(id: ActorId) -> Self {
        Self {
            id,
            role: Role::Exporter,
        }
    }

    /// A validator.
    pub fn validator(id: ActorId) -> Self {
        Self {
            id,
            role: Role::Validator,
        }
    }

    /// An administrator.
    pub fn admin(id: ActorId) -> Self {
        Self {
            id,
            role: Role::Admin,
        }
    }

    /// Whether the actor holds at least `required`.
    pub fn has_role(&self, required: Role) -> bool {
        self.role >= required
    }

    /// Whether the actor may read a case owned by `owner`.
    pub fn can_read(&self, owner: ActorId) -> bool {
        self.id == owner || self.has_role(Role::Validator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_hierarchy() {
        assert!(Role::Exporter < Role::Validator);
        assert!(Role::Validator < Role::Admin);
        assert!(Actor::admin(ActorId::new()).has_role(Role::Validator));
        assert!(!Actor::exporter(ActorId::new()).has_role(Role::Validator));
    }

    #[test]
    fn exporters_read_only_their_own_cases() {
        let owner = ActorId::new();
        assert!(Actor::exporter(owner).can_read(owner));
        assert!(!Actor::exporter(ActorId::new()).can_read(owner));
        assert!(Actor::validator(ActorId::new()).can_read(owner));
    }

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!(Role::from_str_loose("EXPORTER"), Some(Role::Exporter));
        assert_eq!(Role::from_str_loose("Admin"), Some(Role::Admin));
        assert_eq!(Role::from_str_loose("importer"), None);
    }
}
