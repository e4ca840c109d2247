//! Keyed ledger storage. Keys are `"<kind>:<account>"` for per-account scalars
//! and `"<kind>:<account>:<epoch>:<id>"` for secondary records.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use super::balance::{Balance, Progression};
use super::types::{
    AccountSnapshot, FragmentId, ItemId, KeySet, LeagueData, OwnedItem, OwnedItemFragment, SeasonId,
};
use crate::crypto::{bytes32_hex, Address, Bytes32};
use crate::error::LedgerError;
use crate::storage::{get_typed, KvStore, WriteBatch};

fn exists_key(account: &Address) -> String {
    format!("exists:{}", account)
}

fn epoch_key(account: &Address) -> String {
    format!("epoch:{}", account)
}

fn balance_key(account: &Address) -> String {
    format!("balance:{}", account)
}

fn progression_key(account: &Address) -> String {
    format!("progression:{}", account)
}

fn item_key(account: &Address, epoch: u64, id: ItemId) -> String {
    format!("item:{}:{}:{}", account, epoch, id)
}

fn fragment_key(account: &Address, epoch: u64, id: FragmentId) -> String {
    format!("fragment:{}:{}:{}", account, epoch, id)
}

fn league_key(account: &Address, epoch: u64, id: SeasonId) -> String {
    format!("league:{}:{}:{}", account, epoch, id)
}

/// Not epoch-scoped: a signed write stays spent across delete and re-create.
fn write_receipt_key(message: &Bytes32) -> String {
    format!("write:{}", bytes32_hex(message))
}

pub struct LedgerStore {
    kv: Arc<dyn KvStore>,
}

impl LedgerStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, LedgerError> {
        Ok(get_typed(self.kv.as_ref(), key)?.unwrap_or_default())
    }

    pub fn exists(&self, account: &Address) -> Result<bool, LedgerError> {
        self.get_or_default(&exists_key(account))
    }

    /// Generation of the account's secondary-record namespace.
    pub fn epoch(&self, account: &Address) -> Result<u64, LedgerError> {
        self.get_or_default(&epoch_key(account))
    }

    pub fn balance(&self, account: &Address) -> Result<Balance, LedgerError> {
        self.get_or_default(&balance_key(account))
    }

    pub fn progression(&self, account: &Address) -> Result<Progression, LedgerError> {
        self.get_or_default(&progression_key(account))
    }

    pub fn item(&self, account: &Address, id: ItemId) -> Result<OwnedItem, LedgerError> {
        let epoch = self.epoch(account)?;
        self.get_or_default(&item_key(account, epoch, id))
    }

    pub fn fragment(&self, account: &Address, id: FragmentId) -> Result<OwnedItemFragment, LedgerError> {
        let epoch = self.epoch(account)?;
        self.get_or_default(&fragment_key(account, epoch, id))
    }

    pub fn league_record(&self, account: &Address, id: SeasonId) -> Result<LeagueData, LedgerError> {
        let epoch = self.epoch(account)?;
        self.get_or_default(&league_key(account, epoch, id))
    }

    pub fn write_applied(&self, message: &Bytes32) -> Result<bool, LedgerError> {
        self.get_or_default(&write_receipt_key(message))
    }

    /// One output per requested ID, in request order. Missing records read as zero.
    pub fn read_bulk(&self, account: &Address, keys: &KeySet) -> Result<AccountSnapshot, LedgerError> {
        let epoch = self.epoch(account)?;
        debug!(
            "read_bulk {} epoch={} items={} fragments={} seasons={}",
            account,
            epoch,
            keys.item_ids.len(),
            keys.fragment_ids.len(),
            keys.season_ids.len()
        );

        let items = keys
            .item_ids
            .iter()
            .map(|id| self.get_or_default(&item_key(account, epoch, *id)))
            .collect::<Result<Vec<OwnedItem>, _>>()?;
        let fragments = keys
            .fragment_ids
            .iter()
            .map(|id| self.get_or_default(&fragment_key(account, epoch, *id)))
            .collect::<Result<Vec<OwnedItemFragment>, _>>()?;
        let league_records = keys
            .season_ids
            .iter()
            .map(|id| self.get_or_default(&league_key(account, epoch, *id)))
            .collect::<Result<Vec<LeagueData>, _>>()?;

        Ok(AccountSnapshot {
            balance: self.balance(account)?,
            items,
            fragments,
            progression: self.progression(account)?,
            league_records,
        })
    }

    // --- Staging: nothing below touches storage until `commit` ---

    /// Only the identity registry calls this.
    pub(crate) fn stage_exists(&self, batch: &mut WriteBatch, account: &Address, exists: bool) -> Result<(), LedgerError> {
        if exists {
            batch.put(exists_key(account), &true)?;
        } else {
            batch.delete(exists_key(account));
        }
        Ok(())
    }

    pub fn stage_epoch(&self, batch: &mut WriteBatch, account: &Address, epoch: u64) -> Result<(), LedgerError> {
        batch.put(epoch_key(account), &epoch)?;
        Ok(())
    }

    pub fn stage_balance(&self, batch: &mut WriteBatch, account: &Address, balance: Balance) -> Result<(), LedgerError> {
        batch.put(balance_key(account), &balance)?;
        Ok(())
    }

    pub fn stage_progression(
        &self,
        batch: &mut WriteBatch,
        account: &Address,
        progression: Progression,
    ) -> Result<(), LedgerError> {
        batch.put(progression_key(account), &progression)?;
        Ok(())
    }

    pub fn stage_item(
        &self,
        batch: &mut WriteBatch,
        account: &Address,
        id: ItemId,
        item: &OwnedItem,
    ) -> Result<(), LedgerError> {
        let epoch = self.epoch(account)?;
        batch.put(item_key(account, epoch, id), item)?;
        Ok(())
    }

    pub fn stage_fragment(
        &self,
        batch: &mut WriteBatch,
        account: &Address,
        id: FragmentId,
        fragment: &OwnedItemFragment,
    ) -> Result<(), LedgerError> {
        let epoch = self.epoch(account)?;
        batch.put(fragment_key(account, epoch, id), fragment)?;
        Ok(())
    }

    pub fn stage_league_record(
        &self,
        batch: &mut WriteBatch,
        account: &Address,
        id: SeasonId,
        record: &LeagueData,
    ) -> Result<(), LedgerError> {
        let epoch = self.epoch(account)?;
        batch.put(league_key(account, epoch, id), record)?;
        Ok(())
    }

    /// Both packed words back to zero, written explicitly.
    pub fn stage_reset_packed(&self, batch: &mut WriteBatch, account: &Address) -> Result<(), LedgerError> {
        self.stage_balance(batch, account, Balance::default())?;
        self.stage_progression(batch, account, Progression::default())
    }

    /// Removes every named secondary record and zeroes both packed words.
    /// Records whose IDs are not in `keys` stay where they are.
    pub fn stage_clear(&self, batch: &mut WriteBatch, account: &Address, keys: &KeySet) -> Result<(), LedgerError> {
        let epoch = self.epoch(account)?;
        for id in &keys.item_ids {
            batch.delete(item_key(account, epoch, *id));
        }
        for id in &keys.fragment_ids {
            batch.delete(fragment_key(account, epoch, *id));
        }
        for id in &keys.season_ids {
            batch.delete(league_key(account, epoch, *id));
        }
        self.stage_reset_packed(batch, account)
    }

    pub fn stage_write_applied(&self, batch: &mut WriteBatch, message: &Bytes32) -> Result<(), LedgerError> {
        batch.put(write_receipt_key(message), &true)?;
        Ok(())
    }

    pub fn commit(&self, batch: WriteBatch) -> Result<(), LedgerError> {
        self.kv.write(batch)?;
        Ok(())
    }
}
