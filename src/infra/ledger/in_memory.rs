// In-memory implementation of LedgerStore.
//
// Nothing touches the disk, so tests can run the real GuildStateStore without a
// data directory.

use crate::core::ledger::{GuildLedger, LedgerSnapshot, LedgerStore, StoreError};
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryLedgerStore {
    snapshot: RwLock<LedgerSnapshot>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from previously saved state, e.g. to simulate a restart.
    pub fn with_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        self.snapshot.read().await.clone()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn load(&self) -> Result<LedgerSnapshot, StoreError> {
        Ok(self.snapshot().await)
    }

    async fn save_guild(&self, guild_id: u64, ledger: &GuildLedger) -> Result<(), StoreError> {
        self.snapshot
            .write()
            .await
            .put_guild(guild_id, ledger.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::CaseAction;
    use chrono::Utc;

    #[tokio::test]
    async fn test_saves_are_visible_to_load() {
        let store = InMemoryLedgerStore::new();
        assert_eq!(store.load().await.unwrap(), LedgerSnapshot::default());

        let mut ledger = GuildLedger::default();
        ledger.append_case(CaseAction::Kick, 4, 5, None, Utc::now());
        store.save_guild(9, &ledger).await.unwrap();

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.guild(9), ledger);
        assert!(snapshot.warnings.is_empty());
        assert!(snapshot.config.is_empty());
    }
}
