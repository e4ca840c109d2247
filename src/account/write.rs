//! Signed admin writes. An admin signs
//! `keccak256("ledger.write" || account || op || args || timestamp)` off-system;
//! the ledger recovers the signer and applies the write at most once.

use serde::{Deserialize, Serialize};

use super::balance::{Balance, Progression};
use super::types::{FragmentId, ItemId, LeagueData, OwnedItem, OwnedItemFragment, SeasonId};
use crate::crypto::{self, Address, Bytes32, RecoverableSignature};

/// u128 amounts travel as decimal strings in JSON.
mod decimal {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum LedgerWrite {
    AddGold {
        #[serde(with = "decimal")]
        amount: u128,
    },
    SpendGold {
        #[serde(with = "decimal")]
        amount: u128,
    },
    AddMarble {
        #[serde(with = "decimal")]
        amount: u128,
    },
    SpendMarble {
        #[serde(with = "decimal")]
        amount: u128,
    },
    SetProgression {
        #[serde(with = "decimal")]
        draws_per_match: u128,
        #[serde(with = "decimal")]
        draw_length: u128,
    },
    SetItem { id: ItemId, item: OwnedItem },
    SetFragment { id: FragmentId, fragment: OwnedItemFragment },
    SetLeagueRecord { id: SeasonId, record: LeagueData },
}

impl LedgerWrite {
    fn op_code(&self) -> u8 {
        match self {
            LedgerWrite::AddGold { .. } => 1,
            LedgerWrite::SpendGold { .. } => 2,
            LedgerWrite::AddMarble { .. } => 3,
            LedgerWrite::SpendMarble { .. } => 4,
            LedgerWrite::SetProgression { .. } => 5,
            LedgerWrite::SetItem { .. } => 6,
            LedgerWrite::SetFragment { .. } => 7,
            LedgerWrite::SetLeagueRecord { .. } => 8,
        }
    }

    /// Op code followed by the big-endian arguments, fixed width per op.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.op_code()];
        match *self {
            LedgerWrite::AddGold { amount }
            | LedgerWrite::SpendGold { amount }
            | LedgerWrite::AddMarble { amount }
            | LedgerWrite::SpendMarble { amount } => out.extend_from_slice(&amount.to_be_bytes()),
            LedgerWrite::SetProgression { draws_per_match, draw_length } => {
                out.extend_from_slice(&Progression::new(draws_per_match, draw_length).word().to_bytes())
            }
            LedgerWrite::SetItem { id, item } => {
                out.extend_from_slice(&id.to_be_bytes());
                out.push(item.owned as u8);
                out.extend_from_slice(&item.quantity.to_be_bytes());
                out.extend_from_slice(&item.level.to_be_bytes());
            }
            LedgerWrite::SetFragment { id, fragment } => {
                out.extend_from_slice(&id.to_be_bytes());
                out.push(fragment.owned as u8);
                out.extend_from_slice(&fragment.quantity.to_be_bytes());
            }
            LedgerWrite::SetLeagueRecord { id, record } => {
                out.extend_from_slice(&id.to_be_bytes());
                out.extend_from_slice(&record.points.to_be_bytes());
                out.extend_from_slice(&record.wins.to_be_bytes());
                out.extend_from_slice(&record.losses.to_be_bytes());
            }
        }
        out
    }

    /// What an admin must sign to apply this write to `account`.
    pub fn message(&self, account: &Address, timestamp: u64) -> Bytes32 {
        crypto::hash_write_message(account, &self.encode(), timestamp)
    }
}

/// Admin signature over `LedgerWrite::message`. The timestamp doubles as a
/// nonce: a signed write is applied once, so repeating one needs a new timestamp.
#[derive(Debug, Clone, Copy)]
pub struct WriteProof {
    pub timestamp: u64,
    pub admin_signature: RecoverableSignature,
}

/// State after an applied write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Balance(Balance),
    Progression(Progression),
    Record,
}
