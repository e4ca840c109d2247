//! Player accounts: identity registry, signature checks, keyed ledger storage
//! and the lifecycle operations that tie them together.

pub mod types;
pub mod balance;
pub mod auth;
pub mod store;
pub mod registry;
pub mod lifecycle;
pub mod write;

pub use types::{AccountSnapshot, KeySet, LeagueData, OwnedItem, OwnedItemFragment};
pub use balance::{Balance, PackedWord, Progression};
pub use auth::{AuthError, AuthorizationVerifier, RequiredSigner};
pub use store::LedgerStore;
pub use registry::IdentityRegistry;
pub use lifecycle::{AccountLedger, LifecycleProof};
pub use write::{LedgerWrite, WriteOutcome, WriteProof};
