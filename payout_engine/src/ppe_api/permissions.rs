//! Role authorization for the payout API.
//!
//! The engine does not authenticate anyone; callers arrive with a claimed [`ApproverRole`] that upstream middleware
//! has already verified. What the engine does own is the capability check: whether that role may perform a given
//! payout action. The check is injected into [`crate::PayoutApi`] as a trait object built once at startup, so there
//! is no ambient global permission table to mutate.

use std::{collections::HashSet, fmt::Display};

use crate::db_types::ApproverRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ApprovePayout,
    RejectPayout,
}

impl Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::ApprovePayout => write!(f, "approve payouts"),
            Capability::RejectPayout => write!(f, "reject payouts"),
        }
    }
}

pub trait PermissionCheck: Send + Sync {
    fn can_approve(&self, role: ApproverRole, capability: Capability) -> bool;
}

/// A fixed role-to-capability map.
#[derive(Debug, Clone, Default)]
pub struct RolePermissions {
    grants: HashSet<(ApproverRole, Capability)>,
}

impl RolePermissions {
    /// The standard policy: every approver role may both approve and reject payouts.
    pub fn standard() -> Self {
        let mut perms = Self::default();
        for role in [ApproverRole::Security, ApproverRole::Finance, ApproverRole::Admin] {
            perms = perms.with_grant(role, Capability::ApprovePayout).with_grant(role, Capability::RejectPayout);
        }
        perms
    }

    pub fn with_grant(mut self, role: ApproverRole, capability: Capability) -> Self {
        self.grants.insert((role, capability));
        self
    }
}

impl PermissionCheck for RolePermissions {
    fn can_approve(&self, role: ApproverRole, capability: Capability) -> bool {
        self.grants.contains(&(role, capability))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn standard_policy_grants_all_roles() {
        let perms = RolePermissions::standard();
        for role in [ApproverRole::Security, ApproverRole::Finance, ApproverRole::Admin] {
            assert!(perms.can_approve(role, Capability::ApprovePayout));
            assert!(perms.can_approve(role, Capability::RejectPayout));
        }
    }

    #[test]
    fn empty_policy_denies_everything() {
        let perms = RolePermissions::default();
        assert!(!perms.can_approve(ApproverRole::Admin, Capability::ApprovePayout));
    }

    #[test]
    fn grants_are_per_capability() {
        let perms = RolePermissions::default().with_grant(ApproverRole::Finance, Capability::ApprovePayout);
        assert!(perms.can_approve(ApproverRole::Finance, Capability::ApprovePayout));
        assert!(!perms.can_approve(ApproverRole::Finance, Capability::RejectPayout));
    }
}
