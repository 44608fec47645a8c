// Persistence port for the moderation ledger.
//
// The ledger is stored as three independent collections (cases, warnings,
// config), each a map keyed by guild id. Implementations always write all three
// collections in full.

use super::ledger_models::{Case, CaseKind, GuildConfig, GuildLedger, Warning};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Full ledger state as it is laid out on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub cases: BTreeMap<u64, Vec<Case>>,
    /// Guild id -> user id -> warnings.
    pub warnings: BTreeMap<u64, BTreeMap<u64, Vec<Warning>>>,
    pub config: BTreeMap<u64, GuildConfig>,
}

impl LedgerSnapshot {
    /// Every guild that has something in at least one collection.
    pub fn guild_ids(&self) -> BTreeSet<u64> {
        self.cases
            .keys()
            .chain(self.warnings.keys())
            .chain(self.config.keys())
            .copied()
            .collect()
    }

    pub fn guild(&self, guild_id: u64) -> GuildLedger {
        GuildLedger {
            cases: self.cases.get(&guild_id).cloned().unwrap_or_default(),
            warnings: self.warnings.get(&guild_id).cloned().unwrap_or_default(),
            config: self.config.get(&guild_id).cloned(),
        }
    }

    /// Replace one guild's entries. Empty collections are dropped so the
    /// snapshot never carries placeholder keys.
    pub fn put_guild(&mut self, guild_id: u64, ledger: GuildLedger) {
        let GuildLedger {
            cases,
            warnings,
            config,
        } = ledger;

        if cases.is_empty() {
            self.cases.remove(&guild_id);
        } else {
            self.cases.insert(guild_id, cases);
        }

        if warnings.is_empty() {
            self.warnings.remove(&guild_id);
        } else {
            self.warnings.insert(guild_id, warnings);
        }

        match config {
            Some(config) => {
                self.config.insert(guild_id, config);
            }
            None => {
                self.config.remove(&guild_id);
            }
        }
    }
}

/// A warning dropped on load because its case is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DanglingWarning {
    pub guild_id: u64,
    pub user_id: u64,
    pub case_id: u64,
}

impl LedgerSnapshot {
    /// Remove warnings that don't point at a `warn` case issued to the same
    /// user in the same guild. Users and guilds left with no warnings are
    /// dropped too.
    pub fn prune_dangling_warnings(&mut self) -> Vec<DanglingWarning> {
        let mut dropped = Vec::new();
        let cases = &self.cases;

        self.warnings.retain(|&guild_id, users| {
            let guild_cases = cases.get(&guild_id).map(Vec::as_slice).unwrap_or_default();
            users.retain(|&user_id, warnings| {
                warnings.retain(|warning| {
                    let backed = guild_cases.iter().any(|case| {
                        case.case_id == warning.case_id
                            && case.kind() == CaseKind::Warn
                            && case.subject_id == user_id
                    });
                    if !backed {
                        dropped.push(DanglingWarning {
                            guild_id,
                            user_id,
                            case_id: warning.case_id,
                        });
                    }
                    backed
                });
                !warnings.is_empty()
            });
            !users.is_empty()
        });

        dropped
    }
}

/// Durable storage for the ledger.
///
/// Following the same pattern as the other stores: the core owns the logic,
/// implementations only move snapshots in and out.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Everything persisted so far. Collections that are missing start empty.
    async fn load(&self) -> Result<LedgerSnapshot, StoreError>;

    /// Record `ledger` as the new state of `guild_id` and write the full
    /// snapshot. On error nothing is considered committed.
    async fn save_guild(&self, guild_id: u64, ledger: &GuildLedger) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::CaseAction;
    use chrono::Utc;

    #[test]
    fn test_put_guild_round_trips_and_drops_empty_entries() {
        let mut ledger = GuildLedger::default();
        let case = ledger.append_case(CaseAction::Warn, 5, 6, Some("spam"), Utc::now());
        ledger
            .add_warning(5, case.case_id, &case.reason, 6, case.created_at)
            .unwrap();
        ledger.set_log_channel(99);

        let mut snapshot = LedgerSnapshot::default();
        snapshot.put_guild(1, ledger.clone());
        assert_eq!(snapshot.guild(1), ledger);
        assert_eq!(snapshot.guild_ids(), BTreeSet::from([1]));

        snapshot.put_guild(1, GuildLedger::default());
        assert_eq!(snapshot, LedgerSnapshot::default());
    }

    #[test]
    fn test_prune_drops_warnings_without_their_warn_case() {
        let mut ledger = GuildLedger::default();
        let warn = ledger.append_case(CaseAction::Warn, 5, 6, Some("spam"), Utc::now());
        ledger
            .add_warning(5, warn.case_id, &warn.reason, 6, warn.created_at)
            .unwrap();
        let kick = ledger.append_case(CaseAction::Kick, 5, 6, None, Utc::now());

        let mut snapshot = LedgerSnapshot::default();
        snapshot.put_guild(1, ledger.clone());
        snapshot.put_guild(2, ledger);
        // Guild 2 lost its cases; guild 1 has a warning pointing at a kick.
        snapshot.cases.remove(&2);
        let user_warnings = snapshot.warnings.get_mut(&1).unwrap().get_mut(&5).unwrap();
        let mut stray = user_warnings[0].clone();
        stray.case_id = kick.case_id;
        user_warnings.push(stray);

        let dropped = snapshot.prune_dangling_warnings();

        assert_eq!(
            dropped,
            vec![
                DanglingWarning { guild_id: 1, user_id: 5, case_id: 2 },
                DanglingWarning { guild_id: 2, user_id: 5, case_id: 1 },
            ]
        );
        assert_eq!(snapshot.guild(1).list_warnings(5).len(), 1);
        assert!(!snapshot.warnings.contains_key(&2));
        assert!(snapshot.prune_dangling_warnings().is_empty());
    }
}
