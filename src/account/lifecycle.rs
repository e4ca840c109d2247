//! Account lifecycle and ledger mutation.
//!
//! Every operation holds the target account's lock from its first check until its
//! batch is committed and any audit event emitted, so other callers only ever
//! observe the state before or after it.
//! Storage changes for one operation go out in a single `WriteBatch`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::auth::AuthorizationVerifier;
use super::balance::{Balance, Progression};
use super::registry::IdentityRegistry;
use super::store::LedgerStore;
use super::types::{AccountSnapshot, KeySet};
use super::write::{LedgerWrite, WriteOutcome, WriteProof};
use crate::crypto::{self, bytes32_hex, Address, Bytes32, RecoverableSignature};
use crate::error::LedgerError;
use crate::events::{AuditEvent, AuditKind, AuditSink};
use crate::roles::RoleAuthority;
use crate::storage::{KvStore, WriteBatch};

/// Salt, timestamp and admin signature over the lifecycle message.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleProof {
    pub salt: Bytes32,
    pub timestamp: u64,
    pub admin_signature: RecoverableSignature,
}

/// One mutex per account, created on first use.
#[derive(Default)]
struct AccountLocks {
    table: Mutex<HashMap<Address, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    fn handle(&self, account: &Address) -> Arc<Mutex<()>> {
        // Guarded values are `()`; a poisoned entry is still usable.
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.entry(*account).or_default().clone()
    }
}

fn acquire(handle: &Mutex<()>) -> MutexGuard<'_, ()> {
    handle.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct AccountLedger {
    store: Arc<LedgerStore>,
    registry: IdentityRegistry,
    verifier: AuthorizationVerifier,
    audit: Arc<dyn AuditSink>,
    locks: AccountLocks,
}

impl AccountLedger {
    pub fn new(kv: Arc<dyn KvStore>, roles: Arc<dyn RoleAuthority>, audit: Arc<dyn AuditSink>) -> Self {
        let store = Arc::new(LedgerStore::new(kv));
        Self {
            registry: IdentityRegistry::new(store.clone(), roles.clone()),
            verifier: AuthorizationVerifier::new(roles),
            store,
            audit,
            locks: AccountLocks::default(),
        }
    }

    /// What admins and players must sign for `account`.
    pub fn hash_lifecycle_message(account: &Address, salt: &Bytes32, timestamp: u64) -> Bytes32 {
        crypto::hash_lifecycle_message(account, salt, timestamp)
    }

    pub fn account_exists(&self, account: &Address) -> Result<bool, LedgerError> {
        self.registry.exists(account)
    }

    pub fn is_admin(&self, identity: &Address) -> bool {
        self.registry.is_admin(identity)
    }

    /// Bulk read, allowed for the account itself or an admin.
    pub fn get_account(&self, caller: &Address, account: &Address, keys: &KeySet) -> Result<AccountSnapshot, LedgerError> {
        self.registry.assert_caller_is_self_or_admin(caller, account)?;
        let handle = self.locks.handle(account);
        let _guard = acquire(&handle);
        debug!("get_account {} by {}", account, caller);
        self.store.read_bulk(account, keys)
    }

    pub fn create_account(&self, account: &Address, proof: &LifecycleProof) -> Result<AuditEvent, LedgerError> {
        let handle = self.locks.handle(account);
        let _guard = acquire(&handle);

        self.registry.assert_new(account)?;

        let message = Self::hash_lifecycle_message(account, &proof.salt, proof.timestamp);
        let admin = self.verifier.verify_admin(&message, &proof.admin_signature).map_err(|e| {
            warn!("create_account {} rejected: {}", account, e);
            LedgerError::from(e)
        })?;

        // A fresh epoch gives a re-created account empty item, fragment and league maps.
        let epoch = self
            .store
            .epoch(account)?
            .checked_add(1)
            .ok_or(LedgerError::Overflow)?;

        let mut batch = WriteBatch::new();
        self.registry.set_exists(&mut batch, account, true)?;
        self.store.stage_epoch(&mut batch, account, epoch)?;
        self.store.stage_reset_packed(&mut batch, account)?;
        self.store.commit(batch)?;

        info!("Account created: {} (admin {}, epoch {})", account, admin, epoch);
        Ok(self.emit(AuditKind::AccountCreated, *account))
    }

    /// Requires the admin signature and the player's own signature over the same
    /// lifecycle message. Does not require the account to exist; deleting a
    /// missing account succeeds and leaves it missing.
    pub fn delete_account(
        &self,
        account: &Address,
        keys: &KeySet,
        proof: &LifecycleProof,
        player_signature: &RecoverableSignature,
    ) -> Result<AuditEvent, LedgerError> {
        let handle = self.locks.handle(account);
        let _guard = acquire(&handle);

        let message = Self::hash_lifecycle_message(account, &proof.salt, proof.timestamp);
        let admin = self.verifier.verify_admin(&message, &proof.admin_signature).map_err(|e| {
            warn!("delete_account {} rejected: {}", account, e);
            LedgerError::from(e)
        })?;
        self.verifier
            .verify_player(&message, player_signature, *account)
            .map_err(|e| {
                warn!("delete_account {} rejected: {}", account, e);
                LedgerError::from(e)
            })?;

        let mut batch = WriteBatch::new();
        self.registry.set_exists(&mut batch, account, false)?;
        self.store.stage_clear(&mut batch, account, keys)?;
        self.store.commit(batch)?;

        info!(
            "Account deleted: {} (admin {}, cleared {} items, {} fragments, {} seasons)",
            account,
            admin,
            keys.item_ids.len(),
            keys.fragment_ids.len(),
            keys.season_ids.len()
        );
        Ok(self.emit(AuditKind::AccountDeleted, *account))
    }

    fn emit(&self, kind: AuditKind, account: Address) -> AuditEvent {
        let event = AuditEvent::new(kind, account);
        self.audit.record(event.clone());
        event
    }

    // --- Admin ledger writes ---

    /// What an admin must sign to apply `write` to `account`.
    pub fn hash_write_message(account: &Address, write: &LedgerWrite, timestamp: u64) -> Bytes32 {
        write.message(account, timestamp)
    }

    /// Applies one admin-signed write to a live account. The admin is whoever
    /// the proof recovers to, and each signed message is accepted once.
    pub fn apply_write(
        &self,
        account: &Address,
        write: &LedgerWrite,
        proof: &WriteProof,
    ) -> Result<WriteOutcome, LedgerError> {
        let handle = self.locks.handle(account);
        let _guard = acquire(&handle);

        let message = Self::hash_write_message(account, write, proof.timestamp);
        let admin = self.verifier.verify_admin(&message, &proof.admin_signature).map_err(|e| {
            warn!("write to {} rejected: {}", account, e);
            LedgerError::from(e)
        })?;
        self.registry.assert_exists(account)?;
        if self.store.write_applied(&message)? {
            return Err(LedgerError::WriteAlreadyApplied { message: bytes32_hex(&message) });
        }

        let mut batch = WriteBatch::new();
        let outcome = self.stage_write(&mut batch, account, write)?;
        self.store.stage_write_applied(&mut batch, &message)?;
        self.store.commit(batch)?;

        info!("Write applied to {} by admin {}: {:?}", account, admin, write);
        Ok(outcome)
    }

    fn stage_write(&self, batch: &mut WriteBatch, account: &Address, write: &LedgerWrite) -> Result<WriteOutcome, LedgerError> {
        match *write {
            LedgerWrite::AddGold { amount } => {
                self.stage_balance(batch, account, |b| b.checked_add_gold(amount).ok_or(LedgerError::Overflow))
            }
            LedgerWrite::SpendGold { amount } => self.stage_balance(batch, account, |b| {
                b.checked_sub_gold(amount).ok_or(LedgerError::InsufficientFunds)
            }),
            LedgerWrite::AddMarble { amount } => {
                self.stage_balance(batch, account, |b| b.checked_add_marble(amount).ok_or(LedgerError::Overflow))
            }
            LedgerWrite::SpendMarble { amount } => self.stage_balance(batch, account, |b| {
                b.checked_sub_marble(amount).ok_or(LedgerError::InsufficientFunds)
            }),
            LedgerWrite::SetProgression { draws_per_match, draw_length } => {
                let progression = Progression::new(draws_per_match, draw_length);
                self.store.stage_progression(batch, account, progression)?;
                Ok(WriteOutcome::Progression(progression))
            }
            LedgerWrite::SetItem { id, item } => {
                self.store.stage_item(batch, account, id, &item)?;
                Ok(WriteOutcome::Record)
            }
            LedgerWrite::SetFragment { id, fragment } => {
                self.store.stage_fragment(batch, account, id, &fragment)?;
                Ok(WriteOutcome::Record)
            }
            LedgerWrite::SetLeagueRecord { id, record } => {
                self.store.stage_league_record(batch, account, id, &record)?;
                Ok(WriteOutcome::Record)
            }
        }
    }

    fn stage_balance(
        &self,
        batch: &mut WriteBatch,
        account: &Address,
        apply: impl FnOnce(Balance) -> Result<Balance, LedgerError>,
    ) -> Result<WriteOutcome, LedgerError> {
        let next = apply(self.store.balance(account)?)?;
        self.store.stage_balance(batch, account, next)?;
        Ok(WriteOutcome::Balance(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{LeagueData, OwnedItem, OwnedItemFragment};
    use crate::crypto::{parse_bytes32, KeyPair};
    use crate::events::MemoryAuditSink;
    use crate::roles::StaticRoleAuthority;
    use crate::storage::MemoryStore;

    struct Fixture {
        admin: KeyPair,
        audit: Arc<MemoryAuditSink>,
        ledger: AccountLedger,
    }

    fn fixture() -> Fixture {
        let admin = KeyPair::new();
        let audit = Arc::new(MemoryAuditSink::new());
        let ledger = AccountLedger::new(
            Arc::new(MemoryStore::new()),
            Arc::new(StaticRoleAuthority::new([admin.address()])),
            audit.clone(),
        );
        Fixture { admin, audit, ledger }
    }

    fn proof(signer: &KeyPair, account: &Address, salt: &str, timestamp: u64) -> LifecycleProof {
        let salt = parse_bytes32(salt).unwrap();
        let message = AccountLedger::hash_lifecycle_message(account, &salt, timestamp);
        LifecycleProof {
            salt,
            timestamp,
            admin_signature: signer.sign_message(&message).unwrap(),
        }
    }

    fn player_sig(player: &KeyPair, salt: &str, timestamp: u64) -> RecoverableSignature {
        let message = AccountLedger::hash_lifecycle_message(&player.address(), &parse_bytes32(salt).unwrap(), timestamp);
        player.sign_message(&message).unwrap()
    }

    fn write(
        f: &Fixture,
        signer: &KeyPair,
        account: &Address,
        write: LedgerWrite,
        timestamp: u64,
    ) -> Result<WriteOutcome, LedgerError> {
        let message = AccountLedger::hash_write_message(account, &write, timestamp);
        let proof = WriteProof { timestamp, admin_signature: signer.sign_message(&message).unwrap() };
        f.ledger.apply_write(account, &write, &proof)
    }

    #[test]
    fn test_create_then_create_again_fails() {
        let f = fixture();
        let player = KeyPair::new().address();

        let event = f.ledger.create_account(&player, &proof(&f.admin, &player, "0x01", 1000)).unwrap();
        assert_eq!(event.kind, AuditKind::AccountCreated);
        assert!(f.ledger.account_exists(&player).unwrap());

        // Valid second attempt and garbage second attempt fail the same way.
        let again = f.ledger.create_account(&player, &proof(&f.admin, &player, "0x01", 1000));
        assert_eq!(again.unwrap_err(), LedgerError::AccountAlreadyExists { account: player });
        let stranger = KeyPair::new();
        let bogus = f.ledger.create_account(&player, &proof(&stranger, &player, "0x05", 5));
        assert_eq!(bogus.unwrap_err(), LedgerError::AccountAlreadyExists { account: player });

        assert_eq!(f.audit.len(), 1);
    }

    #[test]
    fn test_create_requires_admin_signature() {
        let f = fixture();
        let player = KeyPair::new();
        let err = f
            .ledger
            .create_account(&player.address(), &proof(&player, &player.address(), "0x01", 1))
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidAdminSignature { recovered: player.address() });
        assert!(!f.ledger.account_exists(&player.address()).unwrap());
        assert!(f.audit.is_empty());
    }

    #[test]
    fn test_admin_signature_is_bound_to_account() {
        let f = fixture();
        let a = KeyPair::new().address();
        let b = KeyPair::new().address();
        let for_a = proof(&f.admin, &a, "0x01", 1000);
        let err = f.ledger.create_account(&b, &for_a).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAdminSignature { .. }));
        assert!(!f.ledger.account_exists(&b).unwrap());
    }

    #[test]
    fn test_malformed_signature_is_named() {
        let f = fixture();
        let player = KeyPair::new().address();
        let mut bad = proof(&f.admin, &player, "0x01", 1);
        bad.admin_signature.0[64] = 9;
        let err = f.ledger.create_account(&player, &bad).unwrap_err();
        assert!(matches!(err, LedgerError::MalformedSignature { .. }));

        // A body with r = s = 0 never recovers a key.
        bad.admin_signature = RecoverableSignature([0u8; 65]);
        let err = f.ledger.create_account(&player, &bad).unwrap_err();
        assert!(matches!(err, LedgerError::MalformedSignature { .. }));
        assert!(!f.ledger.account_exists(&player).unwrap());
    }

    #[test]
    fn test_get_account_gating() {
        let f = fixture();
        let player = KeyPair::new().address();
        let stranger = KeyPair::new().address();
        f.ledger.create_account(&player, &proof(&f.admin, &player, "0x01", 1)).unwrap();

        let keys = KeySet::default();
        assert!(f.ledger.get_account(&player, &player, &keys).is_ok());
        assert!(f.ledger.get_account(&f.admin.address(), &player, &keys).is_ok());
        assert_eq!(
            f.ledger.get_account(&stranger, &player, &keys).unwrap_err(),
            LedgerError::NotSelfOrAdmin { caller: stranger, account: player }
        );
    }

    #[test]
    fn test_delete_clears_every_named_record() {
        let f = fixture();
        let player = KeyPair::new();
        let a = player.address();
        let admin = f.admin.address();
        f.ledger.create_account(&a, &proof(&f.admin, &a, "0x01", 1)).unwrap();

        write(&f, &f.admin, &a, LedgerWrite::AddGold { amount: 500 }, 1).unwrap();
        write(&f, &f.admin, &a, LedgerWrite::AddMarble { amount: 20 }, 2).unwrap();
        write(&f, &f.admin, &a, LedgerWrite::SetProgression { draws_per_match: 3, draw_length: 12 }, 3).unwrap();
        let item = OwnedItem { owned: true, quantity: 1, level: 2 };
        write(&f, &f.admin, &a, LedgerWrite::SetItem { id: 7, item }, 4).unwrap();
        let fragment = OwnedItemFragment { owned: true, quantity: 9 };
        write(&f, &f.admin, &a, LedgerWrite::SetFragment { id: 4, fragment }, 5).unwrap();
        let record = LeagueData { points: 10, wins: 1, losses: 0 };
        write(&f, &f.admin, &a, LedgerWrite::SetLeagueRecord { id: 2024, record }, 6).unwrap();

        let keys = KeySet::new(vec![7], vec![4], vec![2024]);
        assert!(!f.ledger.get_account(&a, &a, &keys).unwrap().is_blank());

        let del = proof(&f.admin, &a, "0x02", 2);
        f.ledger.delete_account(&a, &keys, &del, &player_sig(&player, "0x02", 2)).unwrap();

        assert!(!f.ledger.account_exists(&a).unwrap());
        let snap = f.ledger.get_account(&admin, &a, &keys).unwrap();
        assert!(snap.is_blank());
        assert_eq!(snap.items.len(), 1);
        assert_eq!(f.audit.events().last().unwrap().kind, AuditKind::AccountDeleted);
    }

    #[test]
    fn test_delete_requires_player_signature() {
        let f = fixture();
        let player = KeyPair::new();
        let a = player.address();
        f.ledger.create_account(&a, &proof(&f.admin, &a, "0x01", 1)).unwrap();

        let del = proof(&f.admin, &a, "0x02", 2);
        let someone = KeyPair::new();
        let err = f
            .ledger
            .delete_account(&a, &KeySet::default(), &del, &player_sig(&someone, "0x02", 2))
            .unwrap_err();
        // `someone` signed a message for their own address, so recovery lands elsewhere.
        assert!(matches!(err, LedgerError::InvalidPlayerSignature { expected, .. } if expected == a));
        assert!(f.ledger.account_exists(&a).unwrap());

        // Player signature over different salt is also rejected.
        let err = f
            .ledger
            .delete_account(&a, &KeySet::default(), &del, &player_sig(&player, "0x03", 2))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPlayerSignature { .. }));
        assert!(f.ledger.account_exists(&a).unwrap());
    }

    #[test]
    fn test_delete_requires_admin_before_player() {
        let f = fixture();
        let player = KeyPair::new();
        let a = player.address();
        f.ledger.create_account(&a, &proof(&f.admin, &a, "0x01", 1)).unwrap();

        // Player signs both slots: the admin check rejects it first.
        let self_signed = proof(&player, &a, "0x02", 2);
        let err = f
            .ledger
            .delete_account(&a, &KeySet::default(), &self_signed, &player_sig(&player, "0x02", 2))
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidAdminSignature { recovered: a });
    }

    #[test]
    fn test_delete_of_missing_account_succeeds_without_change() {
        let f = fixture();
        let player = KeyPair::new();
        let a = player.address();

        let del = proof(&f.admin, &a, "0x02", 2);
        f.ledger
            .delete_account(&a, &KeySet::new(vec![1], vec![], vec![]), &del, &player_sig(&player, "0x02", 2))
            .unwrap();

        assert!(!f.ledger.account_exists(&a).unwrap());
        let snap = f.ledger.get_account(&a, &a, &KeySet::new(vec![1], vec![], vec![])).unwrap();
        assert!(snap.is_blank());
    }

    #[test]
    fn test_writes_need_admin_signature_and_live_account() {
        let f = fixture();
        let player = KeyPair::new();
        let a = player.address();

        assert_eq!(
            write(&f, &f.admin, &a, LedgerWrite::AddGold { amount: 1 }, 1).unwrap_err(),
            LedgerError::AccountNotFound { account: a }
        );
        f.ledger.create_account(&a, &proof(&f.admin, &a, "0x01", 1)).unwrap();

        // The admin is whoever the signature recovers to, never a named caller.
        assert_eq!(
            write(&f, &player, &a, LedgerWrite::AddGold { amount: 1 }, 2).unwrap_err(),
            LedgerError::InvalidAdminSignature { recovered: a }
        );

        let out = write(&f, &f.admin, &a, LedgerWrite::AddGold { amount: u128::MAX }, 3).unwrap();
        assert_eq!(out, WriteOutcome::Balance(Balance::new(u128::MAX, 0)));
        assert_eq!(
            write(&f, &f.admin, &a, LedgerWrite::AddGold { amount: 1 }, 4).unwrap_err(),
            LedgerError::Overflow
        );
        assert_eq!(
            write(&f, &f.admin, &a, LedgerWrite::SpendMarble { amount: 1 }, 5).unwrap_err(),
            LedgerError::InsufficientFunds
        );

        let out = write(&f, &f.admin, &a, LedgerWrite::AddMarble { amount: 5 }, 6).unwrap();
        assert_eq!(out, WriteOutcome::Balance(Balance::new(u128::MAX, 5)));
        let out = write(&f, &f.admin, &a, LedgerWrite::SpendGold { amount: u128::MAX }, 7).unwrap();
        assert_eq!(out, WriteOutcome::Balance(Balance::new(0, 5)));
    }

    #[test]
    fn test_signed_write_applies_once() {
        let f = fixture();
        let a = KeyPair::new().address();
        f.ledger.create_account(&a, &proof(&f.admin, &a, "0x01", 1)).unwrap();

        let add = LedgerWrite::AddGold { amount: 10 };
        let message = AccountLedger::hash_write_message(&a, &add, 9);
        let signed = WriteProof { timestamp: 9, admin_signature: f.admin.sign_message(&message).unwrap() };
        f.ledger.apply_write(&a, &add, &signed).unwrap();
        assert_eq!(
            f.ledger.apply_write(&a, &add, &signed).unwrap_err(),
            LedgerError::WriteAlreadyApplied { message: bytes32_hex(&message) }
        );

        // The signature covers the arguments, so it cannot be reused for a larger amount.
        let more = LedgerWrite::AddGold { amount: 1000 };
        assert!(matches!(
            f.ledger.apply_write(&a, &more, &signed).unwrap_err(),
            LedgerError::InvalidAdminSignature { .. }
        ));

        write(&f, &f.admin, &a, add, 10).unwrap();
        let snap = f.ledger.get_account(&a, &a, &KeySet::default()).unwrap();
        assert_eq!(snap.balance.gold(), 20);
    }

    #[test]
    fn test_spent_write_stays_spent_after_recreate() {
        let f = fixture();
        let player = KeyPair::new();
        let a = player.address();
        f.ledger.create_account(&a, &proof(&f.admin, &a, "0x01", 1)).unwrap();

        let add = LedgerWrite::AddGold { amount: 50 };
        let message = AccountLedger::hash_write_message(&a, &add, 5);
        let signed = WriteProof { timestamp: 5, admin_signature: f.admin.sign_message(&message).unwrap() };
        f.ledger.apply_write(&a, &add, &signed).unwrap();

        let del = proof(&f.admin, &a, "0x02", 2);
        f.ledger.delete_account(&a, &KeySet::default(), &del, &player_sig(&player, "0x02", 2)).unwrap();
        f.ledger.create_account(&a, &proof(&f.admin, &a, "0x03", 3)).unwrap();

        assert!(matches!(
            f.ledger.apply_write(&a, &add, &signed).unwrap_err(),
            LedgerError::WriteAlreadyApplied { .. }
        ));
        assert_eq!(f.ledger.get_account(&a, &a, &KeySet::default()).unwrap().balance.gold(), 0);
    }

    #[test]
    fn test_recreated_account_starts_empty() {
        let f = fixture();
        let player = KeyPair::new();
        let a = player.address();

        f.ledger.create_account(&a, &proof(&f.admin, &a, "0x01", 1)).unwrap();
        let item = OwnedItem { owned: true, quantity: 1, level: 1 };
        write(&f, &f.admin, &a, LedgerWrite::SetItem { id: 99, item }, 1).unwrap();

        // Item 99 is not named at deletion.
        let del = proof(&f.admin, &a, "0x02", 2);
        f.ledger.delete_account(&a, &KeySet::default(), &del, &player_sig(&player, "0x02", 2)).unwrap();
        f.ledger.create_account(&a, &proof(&f.admin, &a, "0x03", 3)).unwrap();

        let snap = f.ledger.get_account(&a, &a, &KeySet::new(vec![99], vec![], vec![])).unwrap();
        assert_eq!(snap.items[0], OwnedItem::default());
    }

    #[test]
    fn test_same_tuple_authorizes_create_and_delete() {
        // Both operations sign the same untagged message shape.
        let f = fixture();
        let player = KeyPair::new();
        let a = player.address();
        let shared = proof(&f.admin, &a, "0x07", 70);

        f.ledger.create_account(&a, &shared).unwrap();
        f.ledger
            .delete_account(&a, &KeySet::default(), &shared, &player_sig(&player, "0x07", 70))
            .unwrap();
        assert!(!f.ledger.account_exists(&a).unwrap());
    }

    #[test]
    fn test_concurrent_creates_admit_exactly_one() {
        let f = Arc::new(fixture());
        let player = KeyPair::new().address();
        let p = proof(&f.admin, &player, "0x01", 1);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let f = f.clone();
                std::thread::spawn(move || f.ledger.create_account(&player, &p).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(f.audit.len(), 1);
    }
}
