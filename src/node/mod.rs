use std::sync::Arc;
use tracing::info;

use crate::account::AccountLedger;
use crate::config::{LedgerConfig, StorageBackend};
use crate::error::LedgerError;
use crate::events::{AuditSink, FanoutAuditSink, MemoryAuditSink, TracingAuditSink};
use crate::roles::StaticRoleAuthority;
use crate::rpc::RpcServer;
use crate::storage::{KvStore, MemoryStore, RocksStore};

/// Everything a running ledger service needs, wired from configuration.
pub struct LedgerNode {
    pub config: LedgerConfig,
    pub ledger: Arc<AccountLedger>,
    pub audit_log: Arc<MemoryAuditSink>,
}

impl LedgerNode {
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        let kv: Arc<dyn KvStore> = match config.storage.backend {
            StorageBackend::RocksDb => {
                info!("Opening RocksDB ledger at {}", config.node.db_path);
                Arc::new(RocksStore::open(&config.node.db_path)?)
            }
            StorageBackend::Memory => {
                info!("Using in-memory ledger; state is lost on exit");
                Arc::new(MemoryStore::new())
            }
        };

        if config.authority.admins.is_empty() {
            tracing::warn!("No admins configured; every lifecycle operation will be rejected");
        }
        let roles = Arc::new(StaticRoleAuthority::new(config.authority.admins.iter().copied()));

        let audit_log = Arc::new(MemoryAuditSink::new());
        let audit: Arc<dyn AuditSink> =
            Arc::new(FanoutAuditSink::new(vec![Arc::new(TracingAuditSink), audit_log.clone()]));

        let ledger = Arc::new(AccountLedger::new(kv, roles, audit));
        Ok(Self { config, ledger, audit_log })
    }

    pub async fn run(self) -> std::io::Result<()> {
        let server = RpcServer::new(self.ledger, self.audit_log, self.config.node.rpc_port);
        server.start().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::LifecycleProof;
    use crate::crypto::{hash_lifecycle_message, KeyPair};

    #[test]
    fn test_memory_node_wires_admins_and_audit() {
        let admin = KeyPair::new();
        let mut config = LedgerConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.authority.admins = vec![admin.address()];

        let node = LedgerNode::new(config).unwrap();
        let player = KeyPair::new().address();
        let msg = hash_lifecycle_message(&player, &[3u8; 32], 30);
        let proof = LifecycleProof {
            salt: [3u8; 32],
            timestamp: 30,
            admin_signature: admin.sign_message(&msg).unwrap(),
        };
        node.ledger.create_account(&player, &proof).unwrap();
        assert_eq!(node.audit_log.len(), 1);
    }
}
