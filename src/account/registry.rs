//! Which accounts are live, and who may act on them.

use std::sync::Arc;
use super::store::LedgerStore;
use crate::crypto::Address;
use crate::error::LedgerError;
use crate::roles::{Role, RoleAuthority};
use crate::storage::WriteBatch;

pub struct IdentityRegistry {
    store: Arc<LedgerStore>,
    roles: Arc<dyn RoleAuthority>,
}

impl IdentityRegistry {
    pub fn new(store: Arc<LedgerStore>, roles: Arc<dyn RoleAuthority>) -> Self {
        Self { store, roles }
    }

    pub fn exists(&self, account: &Address) -> Result<bool, LedgerError> {
        self.store.exists(account)
    }

    pub fn is_admin(&self, identity: &Address) -> bool {
        self.roles.has_role(identity, Role::Admin)
    }

    pub fn assert_new(&self, account: &Address) -> Result<(), LedgerError> {
        if self.exists(account)? {
            return Err(LedgerError::AccountAlreadyExists { account: *account });
        }
        Ok(())
    }

    pub fn assert_exists(&self, account: &Address) -> Result<(), LedgerError> {
        if !self.exists(account)? {
            return Err(LedgerError::AccountNotFound { account: *account });
        }
        Ok(())
    }

    pub fn assert_caller_is_self_or_admin(&self, caller: &Address, account: &Address) -> Result<(), LedgerError> {
        if caller == account || self.is_admin(caller) {
            return Ok(());
        }
        Err(LedgerError::NotSelfOrAdmin { caller: *caller, account: *account })
    }

    /// The single path that flips the live flag. Staged, not committed.
    pub fn set_exists(&self, batch: &mut WriteBatch, account: &Address, exists: bool) -> Result<(), LedgerError> {
        self.store.stage_exists(batch, account, exists)
    }
}
