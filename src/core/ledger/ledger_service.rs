// Guild state store - the only way to read or change the moderation ledger.
//
// This service handles:
// - Case numbering and storage (the audit trail)
// - Warning tracking on top of `warn` cases
// - Role permission allowlists and log/report channel settings
// - Persisting a full snapshot after every change
//
// Every mutation for a guild runs inside that guild's exclusive section, and the
// snapshot write happens before the section is released. NO Discord dependencies.

use super::ledger_models::{
    Case, CaseAction, GuildConfig, GuildLedger, WarnReceipt, Warning, WarningRemoval,
};
use super::ledger_store::{LedgerStore, StoreError};
use super::permission_resolver::{self, Actor, PermissionDecision};
use super::retry::RetryPolicy;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to persist ledger after {attempts} attempt(s): {source}")]
    Persistence {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("Ledger commit was interrupted: {0}")]
    CommitAborted(String),
}

impl LedgerError {
    /// Nothing was recorded; the caller should tell the user to try again.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            LedgerError::Persistence { .. } | LedgerError::CommitAborted(_)
        )
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Owns every guild's cases, warnings and config.
pub struct GuildStateStore<S: LedgerStore> {
    store: Arc<S>,
    guilds: DashMap<u64, Arc<Mutex<GuildLedger>>>,
    retry: RetryPolicy,
}

impl<S: LedgerStore> GuildStateStore<S> {
    /// Load whatever the store has persisted and take ownership of it.
    pub async fn new(store: S, retry: RetryPolicy) -> Result<Self, StoreError> {
        let snapshot = store.load().await?;
        let guilds = DashMap::new();
        for guild_id in snapshot.guild_ids() {
            guilds.insert(guild_id, Arc::new(Mutex::new(snapshot.guild(guild_id))));
        }

        tracing::info!(guilds = guilds.len(), "Loaded moderation ledger");
        Ok(Self {
            store: Arc::new(store),
            guilds,
            retry,
        })
    }

    fn guild(&self, guild_id: u64) -> Arc<Mutex<GuildLedger>> {
        Arc::clone(self.guilds.entry(guild_id).or_default().value())
    }

    async fn read<T>(&self, guild_id: u64, f: impl FnOnce(&GuildLedger) -> T) -> T {
        // Reads never create an entry for a guild we've never seen.
        let guild = self.guilds.get(&guild_id).map(|g| Arc::clone(g.value()));
        match guild {
            Some(guild) => f(&*guild.lock().await),
            None => f(&GuildLedger::default()),
        }
    }

    /// Apply `f` to a working copy of the guild's ledger, persist the copy and
    /// only then make it the live state. An unchanged copy is not written.
    async fn mutate<T, F>(&self, guild_id: u64, f: F) -> Result<T, LedgerError>
    where
        T: Send + 'static,
        F: FnOnce(&mut GuildLedger) -> Result<T, LedgerError>,
    {
        let mut guard = self.guild(guild_id).lock_owned().await;
        let mut working = guard.clone();
        let value = f(&mut working)?;
        if working == *guard {
            return Ok(value);
        }

        let store = Arc::clone(&self.store);
        let retry = self.retry.clone();

        // The write and the swap run detached while still holding the guild
        // lock, so a cancelled caller can't leave memory behind the disk.
        let commit = tokio::spawn(async move {
            let written = retry
                .run("ledger snapshot write", || store.save_guild(guild_id, &working))
                .await;

            match written {
                Ok(()) => {
                    *guard = working;
                    Ok(value)
                }
                Err(exhausted) => Err(LedgerError::Persistence {
                    attempts: exhausted.attempts,
                    source: exhausted.error,
                }),
            }
        });

        commit
            .await
            .map_err(|e| LedgerError::CommitAborted(e.to_string()))?
    }

    // ------------------------------------------------------------------------
    // Case ledger
    // ------------------------------------------------------------------------

    /// The id the next appended case would get.
    #[allow(dead_code)]
    pub async fn next_case_id(&self, guild_id: u64) -> u64 {
        self.read(guild_id, GuildLedger::next_case_id).await
    }

    /// Record a moderation action. The id is assigned inside the guild's
    /// exclusive section, so concurrent appends never share an id.
    pub async fn append_case(
        &self,
        guild_id: u64,
        action: CaseAction,
        subject_id: u64,
        actor_id: u64,
        reason: Option<String>,
    ) -> Result<Case, LedgerError> {
        let case = self
            .mutate(guild_id, move |ledger| {
                Ok(ledger.append_case(action, subject_id, actor_id, reason.as_deref(), Utc::now()))
            })
            .await?;

        tracing::info!(
            guild_id,
            case_id = case.case_id,
            kind = %case.kind(),
            subject_id,
            actor_id,
            "Recorded moderation case"
        );
        Ok(case)
    }

    pub async fn get_case(&self, guild_id: u64, case_id: u64) -> Option<Case> {
        self.read(guild_id, |ledger| ledger.get_case(case_id).cloned())
            .await
    }

    /// Returns whether the case exists.
    #[allow(dead_code)]
    pub async fn set_active(
        &self,
        guild_id: u64,
        case_id: u64,
        active: bool,
    ) -> Result<bool, LedgerError> {
        self.mutate(guild_id, move |ledger| Ok(ledger.set_active(case_id, active)))
            .await
    }

    pub async fn cases_for_subject(&self, guild_id: u64, subject_id: u64) -> Vec<Case> {
        self.read(guild_id, |ledger| ledger.cases_for_subject(subject_id))
            .await
    }

    // ------------------------------------------------------------------------
    // Warn tracker
    // ------------------------------------------------------------------------

    /// Track a warning for an existing `warn` case. Returns the user's new count.
    #[allow(dead_code)]
    pub async fn add_warning(
        &self,
        guild_id: u64,
        user_id: u64,
        case_id: u64,
        reason: String,
        actor_id: u64,
    ) -> Result<usize, LedgerError> {
        self.mutate(guild_id, move |ledger| {
            ledger.add_warning(user_id, case_id, &reason, actor_id, Utc::now())
        })
        .await
    }

    /// Append a `warn` case and the matching warning in one commit.
    pub async fn warn(
        &self,
        guild_id: u64,
        user_id: u64,
        actor_id: u64,
        reason: Option<String>,
    ) -> Result<WarnReceipt, LedgerError> {
        let receipt = self
            .mutate(guild_id, move |ledger| {
                let case = ledger.append_case(
                    CaseAction::Warn,
                    user_id,
                    actor_id,
                    reason.as_deref(),
                    Utc::now(),
                );
                let warn_count =
                    ledger.add_warning(user_id, case.case_id, &case.reason, actor_id, case.created_at)?;
                Ok(WarnReceipt { case, warn_count })
            })
            .await?;

        tracing::info!(
            guild_id,
            user_id,
            case_id = receipt.case.case_id,
            warn_count = receipt.warn_count,
            "Warned user"
        );
        Ok(receipt)
    }

    /// Revoke a warning and mark its case inactive, committed together.
    pub async fn remove_warning(
        &self,
        guild_id: u64,
        user_id: u64,
        case_id: u64,
    ) -> Result<WarningRemoval, LedgerError> {
        let removal = self
            .mutate(guild_id, move |ledger| {
                let removal = ledger.remove_warning(user_id, case_id);
                if matches!(removal, WarningRemoval::Removed(_)) {
                    ledger.set_active(case_id, false);
                }
                Ok(removal)
            })
            .await?;

        if matches!(removal, WarningRemoval::Removed(_)) {
            tracing::info!(guild_id, user_id, case_id, "Revoked warning");
        }
        Ok(removal)
    }

    pub async fn list_warnings(&self, guild_id: u64, user_id: u64) -> Vec<Warning> {
        self.read(guild_id, |ledger| ledger.list_warnings(user_id))
            .await
    }

    // ------------------------------------------------------------------------
    // Config store
    // ------------------------------------------------------------------------

    /// Returns `false` if the role already had access.
    pub async fn grant(
        &self,
        guild_id: u64,
        role_id: u64,
        command: &str,
    ) -> Result<bool, LedgerError> {
        let command = command.to_string();
        let granted = self
            .mutate(guild_id, move |ledger| ledger.grant(role_id, &command))
            .await?;
        if granted {
            tracing::info!(guild_id, role_id, "Granted command permission");
        }
        Ok(granted)
    }

    /// Returns `false` if the role didn't have access.
    pub async fn revoke(
        &self,
        guild_id: u64,
        role_id: u64,
        command: &str,
    ) -> Result<bool, LedgerError> {
        let command = command.to_string();
        let revoked = self
            .mutate(guild_id, move |ledger| ledger.revoke(role_id, &command))
            .await?;
        if revoked {
            tracing::info!(guild_id, role_id, "Revoked command permission");
        }
        Ok(revoked)
    }

    pub async fn list_permissions(&self, guild_id: u64, role_id: u64) -> BTreeSet<String> {
        self.read(guild_id, |ledger| ledger.list_permissions(role_id))
            .await
    }

    pub async fn set_log_channel(&self, guild_id: u64, channel_id: u64) -> Result<(), LedgerError> {
        self.mutate(guild_id, move |ledger| {
            ledger.set_log_channel(channel_id);
            Ok(())
        })
        .await
    }

    pub async fn set_report_channel(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<(), LedgerError> {
        self.mutate(guild_id, move |ledger| {
            ledger.set_report_channel(channel_id);
            Ok(())
        })
        .await
    }

    pub async fn config(&self, guild_id: u64) -> Option<GuildConfig> {
        self.read(guild_id, |ledger| ledger.config.clone()).await
    }

    // ------------------------------------------------------------------------
    // Permission resolver
    // ------------------------------------------------------------------------

    pub async fn resolve_permission(
        &self,
        guild_id: u64,
        actor: &Actor,
        command: &str,
    ) -> PermissionDecision {
        self.read(guild_id, |ledger| {
            permission_resolver::resolve(actor, command, ledger.config.as_ref())
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn can_invoke(&self, guild_id: u64, actor: &Actor, command: &str) -> bool {
        self.resolve_permission(guild_id, actor, command)
            .await
            .is_allowed()
    }

    /// Copy of a guild's full state.
    #[cfg(test)]
    pub async fn guild_ledger(&self, guild_id: u64) -> GuildLedger {
        self.read(guild_id, GuildLedger::clone).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
