use serde::Serialize;
use thiserror::Error;

use crate::account::auth::AuthError;
use crate::crypto::Address;
use crate::storage::StorageError;

/// Every rejection the ledger can produce. Nothing is mutated when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum LedgerError {
    #[error("Invalid admin signature: recovered {recovered}")]
    InvalidAdminSignature { recovered: Address },
    #[error("Invalid player signature: expected {expected}, recovered {recovered}")]
    InvalidPlayerSignature { expected: Address, recovered: Address },
    #[error("Malformed signature: {reason}")]
    MalformedSignature { reason: String },
    #[error("Account already exists: {account}")]
    AccountAlreadyExists { account: Address },
    #[error("Caller {caller} is neither {account} nor an admin")]
    NotSelfOrAdmin { caller: Address, account: Address },
    #[error("Account not found: {account}")]
    AccountNotFound { account: Address },
    #[error("Write already applied: {message}")]
    WriteAlreadyApplied { message: String },
    #[error("Arithmetic overflow")]
    Overflow,
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Storage error: {reason}")]
    Storage { reason: String },
}

impl LedgerError {
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidAdminSignature { .. }
                | LedgerError::InvalidPlayerSignature { .. }
                | LedgerError::MalformedSignature { .. }
                | LedgerError::NotSelfOrAdmin { .. }
        )
    }
}

impl From<AuthError> for LedgerError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidAdminSignature(recovered) => LedgerError::InvalidAdminSignature { recovered },
            AuthError::InvalidPlayerSignature { expected, recovered } => {
                LedgerError::InvalidPlayerSignature { expected, recovered }
            }
            AuthError::Malformed(e) => LedgerError::MalformedSignature { reason: e.to_string() },
        }
    }
}

impl From<StorageError> for LedgerError {
    fn from(err: StorageError) -> Self {
        LedgerError::Storage { reason: err.to_string() }
    }
}
