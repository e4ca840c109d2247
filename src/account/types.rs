//! Per-account record types held by the ledger

use serde::{Deserialize, Serialize};
use super::balance::{Balance, Progression};

pub type ItemId = u64;
pub type FragmentId = u64;
pub type SeasonId = u64;

/// An item slot owned by a player. What the ID means is the catalog's concern.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OwnedItem {
    pub owned: bool,
    pub quantity: u64,
    pub level: u32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OwnedItemFragment {
    pub owned: bool,
    pub quantity: u64,
}

/// League standing for one season. Scoring rules live outside the ledger.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LeagueData {
    pub points: u64,
    pub wins: u32,
    pub losses: u32,
}

/// The secondary keys a bulk read or clear should touch. The store cannot
/// enumerate an account's records, so the caller always names them.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct KeySet {
    #[serde(default)]
    pub item_ids: Vec<ItemId>,
    #[serde(default)]
    pub fragment_ids: Vec<FragmentId>,
    #[serde(default)]
    pub season_ids: Vec<SeasonId>,
}

impl KeySet {
    pub fn new(item_ids: Vec<ItemId>, fragment_ids: Vec<FragmentId>, season_ids: Vec<SeasonId>) -> Self {
        Self { item_ids, fragment_ids, season_ids }
    }
}

/// Result of a bulk read. Each vector lines up with the matching `KeySet` field.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub balance: Balance,
    pub items: Vec<OwnedItem>,
    pub fragments: Vec<OwnedItemFragment>,
    pub progression: Progression,
    pub league_records: Vec<LeagueData>,
}

impl AccountSnapshot {
    /// True when every named field holds its zero value.
    pub fn is_blank(&self) -> bool {
        self.balance == Balance::default()
            && self.progression == Progression::default()
            && self.items.iter().all(|i| *i == OwnedItem::default())
            && self.fragments.iter().all(|f| *f == OwnedItemFragment::default())
            && self.league_records.iter().all(|l| *l == LeagueData::default())
    }
}
