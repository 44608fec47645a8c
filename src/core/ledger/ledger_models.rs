// Moderation ledger domain models - cases, warnings and per-guild config.
//
// These are pure domain types with no Discord dependencies. `GuildLedger` holds
// one guild's state and implements the synchronous operations on it; locking and
// persistence are layered on top by `GuildStateStore`.

use super::ledger_service::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Reason recorded when the moderator didn't give one.
pub const DEFAULT_REASON: &str = "No reason provided";

/// Subject id used for cases that target a channel instead of a user.
pub const CHANNEL_SUBJECT: u64 = 0;

/// Commands that can be granted to a role through the permission allowlist.
pub const MODERATION_COMMANDS: &[&str] = &[
    "ban",
    "unban",
    "kick",
    "timeout",
    "untimeout",
    "warn",
    "unwarn",
    "lock",
    "unlock",
    "clear",
];

// ============================================================================
// CASES
// ============================================================================

/// The kind of moderation action a case records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseKind {
    Ban,
    Unban,
    Kick,
    Timeout,
    Untimeout,
    Warn,
    Unwarn,
    Lock,
    Unlock,
    Report,
    Clear,
}

impl CaseKind {
    pub const ALL: [CaseKind; 11] = [
        CaseKind::Ban,
        CaseKind::Unban,
        CaseKind::Kick,
        CaseKind::Timeout,
        CaseKind::Untimeout,
        CaseKind::Warn,
        CaseKind::Unwarn,
        CaseKind::Lock,
        CaseKind::Unlock,
        CaseKind::Report,
        CaseKind::Clear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseKind::Ban => "ban",
            CaseKind::Unban => "unban",
            CaseKind::Kick => "kick",
            CaseKind::Timeout => "timeout",
            CaseKind::Untimeout => "untimeout",
            CaseKind::Warn => "warn",
            CaseKind::Unwarn => "unwarn",
            CaseKind::Lock => "lock",
            CaseKind::Unlock => "unlock",
            CaseKind::Report => "report",
            CaseKind::Clear => "clear",
        }
    }
}

impl fmt::Display for CaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        CaseKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| LedgerError::InvalidArgument(format!("unknown case kind `{}`", s.trim())))
    }
}

/// What happened, together with the attributes only that kind of action carries.
///
/// Serialized with a `kind` tag so a stored case stays a flat record:
/// `{"case_id": 3, "kind": "timeout", "duration_minutes": 60, ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaseAction {
    Ban { days_deleted: u8 },
    Unban,
    Kick,
    Timeout { duration_minutes: u32 },
    Untimeout,
    Warn,
    Unwarn,
    Lock { channel_id: u64 },
    Unlock { channel_id: u64 },
    Report,
    Clear { channel_id: u64, message_count: u32 },
}

impl CaseAction {
    pub fn kind(&self) -> CaseKind {
        match self {
            CaseAction::Ban { .. } => CaseKind::Ban,
            CaseAction::Unban => CaseKind::Unban,
            CaseAction::Kick => CaseKind::Kick,
            CaseAction::Timeout { .. } => CaseKind::Timeout,
            CaseAction::Untimeout => CaseKind::Untimeout,
            CaseAction::Warn => CaseKind::Warn,
            CaseAction::Unwarn => CaseKind::Unwarn,
            CaseAction::Lock { .. } => CaseKind::Lock,
            CaseAction::Unlock { .. } => CaseKind::Unlock,
            CaseAction::Report => CaseKind::Report,
            CaseAction::Clear { .. } => CaseKind::Clear,
        }
    }

    /// Channel the action was applied to, for channel-level actions.
    pub fn channel_id(&self) -> Option<u64> {
        match self {
            CaseAction::Lock { channel_id }
            | CaseAction::Unlock { channel_id }
            | CaseAction::Clear { channel_id, .. } => Some(*channel_id),
            _ => None,
        }
    }
}

/// One recorded moderation action. Only `active` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub case_id: u64,
    #[serde(flatten)]
    pub action: CaseAction,
    /// Affected user, or `CHANNEL_SUBJECT` for channel actions.
    pub subject_id: u64,
    pub actor_id: u64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

impl Case {
    pub fn kind(&self) -> CaseKind {
        self.action.kind()
    }

    pub fn targets_channel(&self) -> bool {
        self.subject_id == CHANNEL_SUBJECT
    }
}

// ============================================================================
// WARNINGS
// ============================================================================

/// An active warning. Points at the `warn` case that created it; the reason,
/// moderator and time are copied so listings don't need the case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub case_id: u64,
    pub reason: String,
    pub actor_id: u64,
    pub created_at: DateTime<Utc>,
}

/// Result of trying to revoke a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningRemoval {
    Removed(Warning),
    /// The user has warnings, but none for that case id.
    NotFound,
    /// The user has no warnings at all.
    NoWarnings,
}

/// Returned by the combined warn operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarnReceipt {
    pub case: Case,
    pub warn_count: usize,
}

// ============================================================================
// CONFIG
// ============================================================================

/// Per-guild moderation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    /// Role id -> commands that role may invoke.
    #[serde(default)]
    pub permissions: BTreeMap<u64, BTreeSet<String>>,
    #[serde(default)]
    pub log_channel_id: Option<u64>,
    #[serde(default)]
    pub report_channel_id: Option<u64>,
}

impl GuildConfig {
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
            && self.log_channel_id.is_none()
            && self.report_channel_id.is_none()
    }
}

/// Canonical form of a command name: trimmed, lowercase, no leading slash.
pub fn normalize_command(command: &str) -> String {
    command.trim().trim_start_matches('/').to_lowercase()
}

fn validate_command(command: &str) -> Result<String, LedgerError> {
    let normalized = normalize_command(command);
    if MODERATION_COMMANDS.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(LedgerError::InvalidArgument(format!(
            "unknown moderation command `{}`",
            command.trim()
        )))
    }
}

fn reason_or_default(reason: Option<&str>) -> String {
    match reason.map(str::trim) {
        Some(reason) if !reason.is_empty() => reason.to_string(),
        _ => DEFAULT_REASON.to_string(),
    }
}

// ============================================================================
// GUILD LEDGER
// ============================================================================

/// Everything recorded for one guild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuildLedger {
    /// Ordered by case id; case `n` lives at index `n - 1`.
    pub cases: Vec<Case>,
    /// User id -> active warnings, oldest first.
    pub warnings: BTreeMap<u64, Vec<Warning>>,
    pub config: Option<GuildConfig>,
}

impl GuildLedger {
    pub fn next_case_id(&self) -> u64 {
        self.cases.len() as u64 + 1
    }

    pub fn append_case(
        &mut self,
        action: CaseAction,
        subject_id: u64,
        actor_id: u64,
        reason: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Case {
        let case = Case {
            case_id: self.next_case_id(),
            action,
            subject_id,
            actor_id,
            reason: reason_or_default(reason),
            created_at,
            active: true,
        };
        self.cases.push(case.clone());
        case
    }

    pub fn get_case(&self, case_id: u64) -> Option<&Case> {
        self.cases.iter().find(|case| case.case_id == case_id)
    }

    /// Returns whether the case exists. Setting the current value is a no-op.
    pub fn set_active(&mut self, case_id: u64, active: bool) -> bool {
        match self.cases.iter_mut().find(|case| case.case_id == case_id) {
            Some(case) => {
                case.active = active;
                true
            }
            None => false,
        }
    }

    pub fn cases_for_subject(&self, subject_id: u64) -> Vec<Case> {
        self.cases
            .iter()
            .filter(|case| case.subject_id == subject_id)
            .cloned()
            .collect()
    }

    /// Track a warning for `user_id` backed by an existing `warn` case.
    /// Returns the user's new warning count.
    pub fn add_warning(
        &mut self,
        user_id: u64,
        case_id: u64,
        reason: &str,
        actor_id: u64,
        created_at: DateTime<Utc>,
    ) -> Result<usize, LedgerError> {
        match self.get_case(case_id) {
            None => {
                return Err(LedgerError::InvalidArgument(format!(
                    "case #{case_id} does not exist"
                )))
            }
            Some(case) if case.kind() != CaseKind::Warn => {
                return Err(LedgerError::InvalidArgument(format!(
                    "case #{case_id} is a {} case, not a warn case",
                    case.kind()
                )))
            }
            Some(case) if case.subject_id != user_id => {
                return Err(LedgerError::InvalidArgument(format!(
                    "case #{case_id} was issued to a different user"
                )))
            }
            Some(_) => {}
        }

        let warnings = self.warnings.entry(user_id).or_default();
        if warnings.iter().any(|w| w.case_id == case_id) {
            return Err(LedgerError::InvalidArgument(format!(
                "case #{case_id} is already tracked as a warning"
            )));
        }

        warnings.push(Warning {
            case_id,
            reason: reason.to_string(),
            actor_id,
            created_at,
        });
        Ok(warnings.len())
    }

    /// Drop the user's warning for `case_id`. The case itself is left alone;
    /// `GuildStateStore::remove_warning` flips it inactive in the same commit.
    pub fn remove_warning(&mut self, user_id: u64, case_id: u64) -> WarningRemoval {
        let Some(warnings) = self.warnings.get_mut(&user_id).filter(|w| !w.is_empty()) else {
            return WarningRemoval::NoWarnings;
        };
        let Some(index) = warnings.iter().position(|w| w.case_id == case_id) else {
            return WarningRemoval::NotFound;
        };

        let removed = warnings.remove(index);
        if warnings.is_empty() {
            self.warnings.remove(&user_id);
        }
        WarningRemoval::Removed(removed)
    }

    pub fn list_warnings(&self, user_id: u64) -> Vec<Warning> {
        self.warnings.get(&user_id).cloned().unwrap_or_default()
    }

    /// Returns `false` when the role already had the command.
    pub fn grant(&mut self, role_id: u64, command: &str) -> Result<bool, LedgerError> {
        let command = validate_command(command)?;
        let config = self.config.get_or_insert_with(GuildConfig::default);
        Ok(config.permissions.entry(role_id).or_default().insert(command))
    }

    /// Returns `false` when the role didn't have the command.
    pub fn revoke(&mut self, role_id: u64, command: &str) -> Result<bool, LedgerError> {
        let command = validate_command(command)?;
        let Some(config) = self.config.as_mut() else {
            return Ok(false);
        };
        let Some(commands) = config.permissions.get_mut(&role_id) else {
            return Ok(false);
        };

        let removed = commands.remove(&command);
        if commands.is_empty() {
            config.permissions.remove(&role_id);
        }
        if config.is_empty() {
            self.config = None;
        }
        Ok(removed)
    }

    pub fn list_permissions(&self, role_id: u64) -> BTreeSet<String> {
        self.config
            .as_ref()
            .and_then(|config| config.permissions.get(&role_id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_log_channel(&mut self, channel_id: u64) {
        self.config
            .get_or_insert_with(GuildConfig::default)
            .log_channel_id = Some(channel_id);
    }

    pub fn set_report_channel(&mut self, channel_id: u64) {
        self.config
            .get_or_insert_with(GuildConfig::default)
            .report_channel_id = Some(channel_id);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn warn_case(ledger: &mut GuildLedger, user_id: u64, reason: &str) -> Case {
        ledger.append_case(CaseAction::Warn, user_id, 9, Some(reason), Utc::now())
    }

    #[test]
    fn test_case_ids_follow_sequence_length() {
        let mut ledger = GuildLedger::default();
        assert_eq!(ledger.next_case_id(), 1);

        for expected in 1..=5 {
            let case = ledger.append_case(CaseAction::Kick, 42, 7, None, Utc::now());
            assert_eq!(case.case_id, expected);
        }

        assert_eq!(ledger.next_case_id(), 6);
        let ids: Vec<u64> = ledger.cases.iter().map(|c| c.case_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_get_case_returns_stored_record_with_extras() {
        let mut ledger = GuildLedger::default();
        let stored = ledger.append_case(
            CaseAction::Clear {
                channel_id: 555,
                message_count: 42,
            },
            CHANNEL_SUBJECT,
            7,
            Some("cleanup"),
            Utc::now(),
        );

        let fetched = ledger.get_case(stored.case_id).unwrap();
        assert_eq!(fetched, &stored);
        assert_eq!(fetched.action.channel_id(), Some(555));
        assert!(fetched.targets_channel());
        assert!(fetched.active);
        assert!(ledger.get_case(2).is_none());
    }

    #[test]
    fn test_blank_reason_gets_default() {
        let mut ledger = GuildLedger::default();
        let case = ledger.append_case(CaseAction::Unban, 1, 2, Some("   "), Utc::now());
        assert_eq!(case.reason, DEFAULT_REASON);
        let case = ledger.append_case(CaseAction::Unban, 1, 2, None, Utc::now());
        assert_eq!(case.reason, DEFAULT_REASON);
    }

    #[test]
    fn test_set_active_is_idempotent_and_ignores_missing_cases() {
        let mut ledger = GuildLedger::default();
        warn_case(&mut ledger, 1, "spam");

        assert!(ledger.set_active(1, false));
        assert!(ledger.set_active(1, false));
        assert!(!ledger.get_case(1).unwrap().active);
        assert!(!ledger.set_active(99, false));
    }

    #[test]
    fn test_warn_counts_increase_in_order() {
        let mut ledger = GuildLedger::default();
        let mut counts = Vec::new();
        for i in 0..4 {
            let case = warn_case(&mut ledger, 10, &format!("reason {}", i));
            counts.push(
                ledger
                    .add_warning(10, case.case_id, &case.reason, 9, case.created_at)
                    .unwrap(),
            );
        }

        assert_eq!(counts, vec![1, 2, 3, 4]);
        let listed: Vec<u64> = ledger.list_warnings(10).iter().map(|w| w.case_id).collect();
        assert_eq!(listed, vec![1, 2, 3, 4]);
        assert!(ledger.list_warnings(11).is_empty());
    }

    #[test]
    fn test_add_warning_rejects_bad_references() {
        let mut ledger = GuildLedger::default();
        ledger.append_case(CaseAction::Kick, 10, 9, None, Utc::now());
        let warn = warn_case(&mut ledger, 10, "spam");

        assert!(matches!(
            ledger.add_warning(10, 99, "x", 9, Utc::now()),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.add_warning(10, 1, "x", 9, Utc::now()),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.add_warning(11, warn.case_id, "x", 9, Utc::now()),
            Err(LedgerError::InvalidArgument(_))
        ));

        ledger
            .add_warning(10, warn.case_id, "spam", 9, Utc::now())
            .unwrap();
        assert!(matches!(
            ledger.add_warning(10, warn.case_id, "spam", 9, Utc::now()),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert_eq!(ledger.list_warnings(10).len(), 1);
    }

    #[test]
    fn test_remove_warning_distinguishes_missing_cases() {
        let mut ledger = GuildLedger::default();
        assert_eq!(ledger.remove_warning(10, 1), WarningRemoval::NoWarnings);

        let case = warn_case(&mut ledger, 10, "spam");
        ledger
            .add_warning(10, case.case_id, "spam", 9, case.created_at)
            .unwrap();

        let before = ledger.clone();
        assert_eq!(ledger.remove_warning(10, 5), WarningRemoval::NotFound);
        assert_eq!(ledger, before);

        match ledger.remove_warning(10, case.case_id) {
            WarningRemoval::Removed(warning) => assert_eq!(warning.case_id, case.case_id),
            other => panic!("expected removal, got {:?}", other),
        }
        assert!(ledger.list_warnings(10).is_empty());
        assert_eq!(ledger.remove_warning(10, case.case_id), WarningRemoval::NoWarnings);
    }

    #[test]
    fn test_grant_then_revoke_restores_prior_state() {
        let mut ledger = GuildLedger::default();
        let before = ledger.clone();

        assert!(ledger.grant(100, "ban").unwrap());
        assert!(!ledger.grant(100, "/BAN ").unwrap());
        assert_eq!(
            ledger.list_permissions(100),
            BTreeSet::from(["ban".to_string()])
        );

        assert!(ledger.revoke(100, "ban").unwrap());
        assert!(!ledger.revoke(100, "ban").unwrap());
        assert_eq!(ledger, before);
        assert!(ledger.list_permissions(100).is_empty());
    }

    #[test]
    fn test_revoke_keeps_config_with_channels() {
        let mut ledger = GuildLedger::default();
        ledger.set_log_channel(77);
        ledger.grant(100, "kick").unwrap();
        ledger.revoke(100, "kick").unwrap();

        let config = ledger.config.as_ref().unwrap();
        assert!(config.permissions.is_empty());
        assert_eq!(config.log_channel_id, Some(77));
    }

    #[test]
    fn test_unknown_commands_are_rejected() {
        let mut ledger = GuildLedger::default();
        assert!(matches!(
            ledger.grant(1, "nuke"),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.revoke(1, "report"),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(ledger.config.is_none());
    }

    #[test]
    fn test_channels_are_last_write_wins() {
        let mut ledger = GuildLedger::default();
        ledger.set_report_channel(1);
        ledger.set_report_channel(2);
        ledger.set_log_channel(3);

        let config = ledger.config.unwrap();
        assert_eq!(config.report_channel_id, Some(2));
        assert_eq!(config.log_channel_id, Some(3));
    }

    #[test]
    fn test_case_kind_parsing() {
        assert_eq!("Timeout".parse::<CaseKind>().unwrap(), CaseKind::Timeout);
        assert_eq!(" clear ".parse::<CaseKind>().unwrap(), CaseKind::Clear);
        assert!(matches!(
            "mute".parse::<CaseKind>(),
            Err(LedgerError::InvalidArgument(_))
        ));
        for kind in CaseKind::ALL {
            assert_eq!(kind.to_string().parse::<CaseKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_case_serializes_flat_with_kind_tag() {
        let mut ledger = GuildLedger::default();
        let case = ledger.append_case(
            CaseAction::Timeout {
                duration_minutes: 90,
            },
            42,
            7,
            Some("flooding"),
            Utc::now(),
        );

        let value = serde_json::to_value(&case).unwrap();
        assert_eq!(value["kind"], "timeout");
        assert_eq!(value["duration_minutes"], 90);
        assert_eq!(value["subject_id"], 42);

        let back: Case = serde_json::from_value(value).unwrap();
        assert_eq!(back, case);
    }

    #[test]
    fn test_unknown_kind_fails_to_deserialize() {
        let raw = serde_json::json!({
            "case_id": 1,
            "kind": "mute",
            "subject_id": 1,
            "actor_id": 2,
            "reason": "x",
            "created_at": "2024-01-01T00:00:00Z",
            "active": true
        });
        assert!(serde_json::from_value::<Case>(raw).is_err());
    }
}
