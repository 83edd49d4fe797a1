//! # Access Scope
//!
//! Which branches an actor may see and act on.
//!
//! ```text
//!   Actor { role: Admin }             → Unrestricted
//!   Actor { role: _, branch: "B-01" } → Branch("B-01")
//!   Actor { role: _, branch: None }   → Unassigned
//!
//!   Facture.branch_id == None         → visible to every scope
//! ```
//!
//! A facture outside the scope is reported as "not found", never as
//! "forbidden", so its existence does not leak.

use serde::{Deserialize, Serialize};

use crate::types::Actor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessScope {
    /// Every branch.
    Unrestricted,
    /// A single branch (plus branch-less factures).
    Branch(String),
    /// No branch assigned: only branch-less factures.
    Unassigned,
}

impl AccessScope {
    pub fn for_actor(actor: &Actor) -> Self {
        if actor.role.is_elevated() {
            return AccessScope::Unrestricted;
        }
        match actor.branch_id.as_deref().map(str::trim) {
            Some(branch) if !branch.is_empty() => AccessScope::Branch(branch.to_string()),
            _ => AccessScope::Unassigned,
        }
    }

    /// Whether a facture with the given branch falls inside this scope.
    pub fn allows(&self, branch_id: Option<&str>) -> bool {
        match (self, branch_id) {
            (_, None) => true,
            (AccessScope::Unrestricted, Some(_)) => true,
            (AccessScope::Branch(scope), Some(branch)) => scope == branch,
            (AccessScope::Unassigned, Some(_)) => false,
        }
    }

    /// Bind parameters for the SQL predicate
    /// `(branch_id IS NULL OR ? = 1 OR branch_id = ?)`.
    ///
    /// Unassigned binds NULL, so only the `IS NULL` arm can match.
    pub fn sql_params(&self) -> (bool, Option<&str>) {
        match self {
            AccessScope::Unrestricted => (true, None),
            AccessScope::Branch(branch) => (false, Some(branch.as_str())),
            AccessScope::Unassigned => (false, None),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn actor(role: Role, branch: Option<&str>) -> Actor {
        Actor {
            user_id: "u1".to_string(),
            role,
            branch_id: branch.map(str::to_string),
        }
    }

    #[test]
    fn test_scope_for_actor() {
        assert_eq!(
            AccessScope::for_actor(&actor(Role::Admin, Some("B-01"))),
            AccessScope::Unrestricted
        );
        assert_eq!(
            AccessScope::for_actor(&actor(Role::Manager, Some("B-01"))),
            AccessScope::Branch("B-01".to_string())
        );
        assert_eq!(
            AccessScope::for_actor(&actor(Role::Staff, None)),
            AccessScope::Unassigned
        );
        assert_eq!(
            AccessScope::for_actor(&actor(Role::Staff, Some("  "))),
            AccessScope::Unassigned
        );
    }

    #[test]
    fn test_branch_scope_never_sees_other_branch() {
        let scope = AccessScope::Branch("A".to_string());
        assert!(scope.allows(Some("A")));
        assert!(!scope.allows(Some("B")));
        assert!(scope.allows(None));
    }

    #[test]
    fn test_unassigned_sees_only_branchless() {
        let scope = AccessScope::Unassigned;
        assert!(scope.allows(None));
        assert!(!scope.allows(Some("A")));
    }
}
