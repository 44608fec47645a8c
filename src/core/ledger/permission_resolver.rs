// Permission resolution for moderation commands.
//
// Pure function over the actor's roles, the command name and the guild config.
// The Discord layer builds an `Actor` from the invoking member and asks here.

use super::ledger_models::{normalize_command, GuildConfig};

/// The member asking to run a command, reduced to plain ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: u64,
    pub role_ids: Vec<u64>,
    /// Holds the platform's administrator capability.
    pub is_administrator: bool,
}

/// Why a command was allowed or denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    /// One of the actor's roles has the command on its allowlist.
    GrantedByRole(u64),
    /// Administrators may run every command, whatever the allowlist says.
    Administrator,
    Denied,
}

impl PermissionDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, PermissionDecision::Denied)
    }
}

/// Decide whether `actor` may invoke `command` in a guild with `config`.
///
/// 1. No config, or no role permissions configured: administrators only.
/// 2. Otherwise any role of the actor listing the command grants it.
/// 3. Failing that, administrators still pass.
pub fn resolve(actor: &Actor, command: &str, config: Option<&GuildConfig>) -> PermissionDecision {
    let Some(permissions) = config
        .map(|config| &config.permissions)
        .filter(|permissions| !permissions.is_empty())
    else {
        return administrator_fallback(actor);
    };

    let command = normalize_command(command);
    let granting_role = actor.role_ids.iter().copied().find(|role_id| {
        permissions
            .get(role_id)
            .is_some_and(|commands| commands.contains(&command))
    });

    match granting_role {
        Some(role_id) => PermissionDecision::GrantedByRole(role_id),
        None => administrator_fallback(actor),
    }
}

#[allow(dead_code)]
pub fn can_invoke(actor: &Actor, command: &str, config: Option<&GuildConfig>) -> bool {
    resolve(actor, command, config).is_allowed()
}

fn administrator_fallback(actor: &Actor) -> PermissionDecision {
    if actor.is_administrator {
        PermissionDecision::Administrator
    } else {
        PermissionDecision::Denied
    }
}
