// RPC types for JSON-RPC 2.0 protocol
use serde::{Deserialize, Serialize};

use crate::account::{AccountSnapshot, LeagueData, LedgerWrite, OwnedItem, OwnedItemFragment, WriteOutcome};
use crate::crypto::{Address, RecoverableSignature};

#[derive(Deserialize, Debug)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: u64,
}

#[derive(Serialize, Debug)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: u64,
}

#[derive(Serialize, Debug, Clone)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

// Method-specific parameter types
#[derive(Deserialize, Debug)]
pub struct GetAccountParams {
    pub account: Address,
    #[serde(default)]
    pub item_ids: Vec<u64>,
    #[serde(default)]
    pub fragment_ids: Vec<u64>,
    #[serde(default)]
    pub season_ids: Vec<u64>,
    pub timestamp: u64,
    /// Signature over `hashReadMessage(account, timestamp)`; identifies the caller.
    /// The timestamp is not checked for freshness, so a captured read proof keeps
    /// authorizing reads of `account` for as long as its signer is self or admin.
    pub caller_signature: RecoverableSignature,
}

#[derive(Deserialize, Debug)]
pub struct CreateAccountParams {
    pub account: Address,
    pub salt: String,
    pub timestamp: u64,
    pub admin_signature: RecoverableSignature,
}

#[derive(Deserialize, Debug)]
pub struct DeleteAccountParams {
    pub account: Address,
    #[serde(default)]
    pub item_ids: Vec<u64>,
    #[serde(default)]
    pub fragment_ids: Vec<u64>,
    #[serde(default)]
    pub season_ids: Vec<u64>,
    pub salt: String,
    pub timestamp: u64,
    pub admin_signature: RecoverableSignature,
    pub player_signature: RecoverableSignature,
}

#[derive(Deserialize, Debug)]
pub struct AccountExistsParams {
    pub account: Address,
}

#[derive(Deserialize, Debug)]
pub struct HashLifecycleParams {
    pub account: Address,
    pub salt: String,
    pub timestamp: u64,
}

#[derive(Deserialize, Debug)]
pub struct ApplyWriteParams {
    pub account: Address,
    pub write: LedgerWrite,
    pub timestamp: u64,
    pub admin_signature: RecoverableSignature,
}

#[derive(Deserialize, Debug)]
pub struct HashWriteParams {
    pub account: Address,
    pub write: LedgerWrite,
    pub timestamp: u64,
}

#[derive(Deserialize, Debug)]
pub struct HashReadParams {
    pub account: Address,
    pub timestamp: u64,
}

/// u128 halves travel as decimal strings; JSON numbers lose precision past 2^53.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BalanceView {
    pub gold: String,
    pub marble: String,
    pub packed: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProgressionView {
    pub draws_per_match: String,
    pub draw_length: String,
    pub packed: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AccountView {
    pub balance: BalanceView,
    pub items: Vec<OwnedItem>,
    pub fragments: Vec<OwnedItemFragment>,
    pub progression: ProgressionView,
    pub league_records: Vec<LeagueData>,
}

impl From<AccountSnapshot> for AccountView {
    fn from(snap: AccountSnapshot) -> Self {
        Self {
            balance: BalanceView {
                gold: snap.balance.gold().to_string(),
                marble: snap.balance.marble().to_string(),
                packed: snap.balance.word().to_string(),
            },
            items: snap.items,
            fragments: snap.fragments,
            progression: ProgressionView {
                draws_per_match: snap.progression.draws_per_match().to_string(),
                draw_length: snap.progression.draw_length().to_string(),
                packed: snap.progression.word().to_string(),
            },
            league_records: snap.league_records,
        }
    }
}

/// Result of `applyWrite`: the new packed word for balance and progression writes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WriteResultView {
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<BalanceView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progression: Option<ProgressionView>,
}

impl From<WriteOutcome> for WriteResultView {
    fn from(outcome: WriteOutcome) -> Self {
        let mut view = WriteResultView { applied: true, balance: None, progression: None };
        match outcome {
            WriteOutcome::Balance(b) => {
                view.balance = Some(BalanceView {
                    gold: b.gold().to_string(),
                    marble: b.marble().to_string(),
                    packed: b.word().to_string(),
                })
            }
            WriteOutcome::Progression(p) => {
                view.progression = Some(ProgressionView {
                    draws_per_match: p.draws_per_match().to_string(),
                    draw_length: p.draw_length().to_string(),
                    packed: p.word().to_string(),
                })
            }
            WriteOutcome::Record => {}
        }
        view
    }
}
