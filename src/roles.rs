//! Role membership as an injected capability. Granting and revoking roles
//! happens elsewhere; the ledger only asks.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::RwLock;
use crate::crypto::Address;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}. Allowed: admin", s)),
        }
    }
}

pub trait RoleAuthority: Send + Sync {
    fn has_role(&self, identity: &Address, role: Role) -> bool;
}

/// Role table seeded from configuration.
#[derive(Debug, Default)]
pub struct StaticRoleAuthority {
    admins: RwLock<HashSet<Address>>,
}

impl StaticRoleAuthority {
    pub fn new(admins: impl IntoIterator<Item = Address>) -> Self {
        Self {
            admins: RwLock::new(admins.into_iter().collect()),
        }
    }

    pub fn grant_admin(&self, identity: Address) {
        if let Ok(mut admins) = self.admins.write() {
            admins.insert(identity);
        }
    }

    pub fn revoke_admin(&self, identity: &Address) {
        if let Ok(mut admins) = self.admins.write() {
            admins.remove(identity);
        }
    }
}

impl RoleAuthority for StaticRoleAuthority {
    fn has_role(&self, identity: &Address, role: Role) -> bool {
        match role {
            // A poisoned table answers "no"; it never grants by accident.
            Role::Admin => self.admins.read().map(|a| a.contains(identity)).unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_static_authority() {
        let admin = KeyPair::new().address();
        let other = KeyPair::new().address();
        let roles = StaticRoleAuthority::new([admin]);

        assert!(roles.has_role(&admin, Role::Admin));
        assert!(!roles.has_role(&other, Role::Admin));

        roles.grant_admin(other);
        assert!(roles.has_role(&other, Role::Admin));
        roles.revoke_admin(&other);
        assert!(!roles.has_role(&other, Role::Admin));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("user".parse::<Role>().is_err());
    }
}
