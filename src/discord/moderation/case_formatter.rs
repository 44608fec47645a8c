use crate::core::ledger::{Case, CaseAction, CaseKind, Warning};
use poise::serenity_prelude::{self as serenity, CreateEmbed, CreateEmbedFooter};
use std::collections::BTreeSet;

const RED: u32 = 0xED4245;
const GREEN: u32 = 0x57F287;
const YELLOW: u32 = 0xFEE75C;
const ORANGE: u32 = 0xF26522;
const BLURPLE: u32 = 0x5865F2;

/// Discord caps embeds at 25 fields.
const MAX_FIELDS: usize = 25;

/// Emoji, display name and embed color for each kind of case.
pub fn kind_style(kind: CaseKind) -> (&'static str, &'static str, u32) {
    match kind {
        CaseKind::Ban => ("🔨", "Ban", RED),
        CaseKind::Unban => ("✅", "Unban", GREEN),
        CaseKind::Kick => ("👢", "Kick", YELLOW),
        CaseKind::Timeout => ("⏱️", "Timeout", ORANGE),
        CaseKind::Untimeout => ("✅", "Untimeout", GREEN),
        CaseKind::Warn => ("⚠️", "Warning", YELLOW),
        CaseKind::Unwarn => ("✅", "Unwarn", GREEN),
        CaseKind::Lock => ("🔒", "Lock", RED),
        CaseKind::Unlock => ("🔓", "Unlock", GREEN),
        CaseKind::Report => ("🚨", "Report", RED),
        CaseKind::Clear => ("🗑️", "Clear", GREEN),
    }
}

/// Kind-specific attributes as (field name, value) pairs.
pub fn case_extras(action: &CaseAction) -> Vec<(&'static str, String)> {
    match action {
        CaseAction::Ban { days_deleted } => {
            vec![("Messages", format!("{} day(s) deleted", days_deleted))]
        }
        CaseAction::Timeout { duration_minutes } => {
            vec![("Duration", format!("{} minutes", duration_minutes))]
        }
        CaseAction::Clear { message_count, .. } => {
            vec![("Messages", format!("{} deleted", message_count))]
        }
        _ => Vec::new(),
    }
}

/// Who or what the case targeted, as a (field name, mention) pair.
pub fn case_target(case: &Case) -> (&'static str, String) {
    match case.action.channel_id() {
        Some(channel_id) if case.targets_channel() => ("Channel", format!("<#{}>", channel_id)),
        _ if case.targets_channel() => ("Channel", "Unknown".to_string()),
        _ => ("User", format!("<@{}> (`{}`)", case.subject_id, case.subject_id)),
    }
}

fn footer(guild_id: u64) -> CreateEmbedFooter {
    CreateEmbedFooter::new(format!("Guild ID: {}", guild_id))
}

/// Confirmation posted after a moderation action is recorded. Also what goes
/// to the log channel.
pub fn action_embed(guild_id: u64, case: &Case, title: &str, description: String) -> CreateEmbed {
    let (_, _, color) = kind_style(case.kind());
    let (target_name, target) = case_target(case);

    let mut embed = CreateEmbed::default()
        .title(title)
        .description(description)
        .color(color)
        .field("Case ID", format!("`#{}`", case.case_id), true)
        .field(target_name, target, true)
        .field("Moderator", format!("<@{}>", case.actor_id), true);

    for (name, value) in case_extras(&case.action) {
        embed = embed.field(name, value, true);
    }

    embed
        .field("Reason", case.reason.as_str(), false)
        .footer(footer(guild_id))
        .timestamp(serenity::Timestamp::now())
}

/// Full view of a single case for `/case`.
pub fn case_details(guild_id: u64, case: &Case) -> CreateEmbed {
    let (emoji, label, color) = kind_style(case.kind());
    let (target_name, target) = case_target(case);
    let status = if case.active { "✅ Active" } else { "❌ Inactive" };

    let mut embed = CreateEmbed::default()
        .title(format!("{} Case #{} - {}", emoji, case.case_id, label))
        .color(color)
        .field(target_name, target, true)
        .field("Moderator", format!("<@{}>", case.actor_id), true)
        .field("Date", format!("<t:{}:F>", case.created_at.timestamp()), true)
        .field("Reason", case.reason.as_str(), false)
        .field("Status", status, true);

    for (name, value) in case_extras(&case.action) {
        embed = embed.field(name, value, true);
    }

    embed
        .footer(footer(guild_id))
        .timestamp(serenity::Timestamp::now())
}

pub fn warnings_embed(guild_id: u64, user: &serenity::User, warnings: &[Warning]) -> CreateEmbed {
    let base = CreateEmbed::default()
        .thumbnail(user.face())
        .footer(footer(guild_id))
        .timestamp(serenity::Timestamp::now());

    if warnings.is_empty() {
        return base
            .title("No warnings")
            .description(format!("<@{}> has no active warnings.", user.id))
            .color(GREEN);
    }

    let mut embed = base
        .title("Warnings")
        .description(format!(
            "<@{}> has **{}** active warning(s).",
            user.id,
            warnings.len()
        ))
        .color(YELLOW);

    for warning in warnings.iter().take(MAX_FIELDS) {
        embed = embed.field(
            format!("Case #{}", warning.case_id),
            format!(
                "**Reason:** {}\n**Moderator:** <@{}>\n**Date:** <t:{}:R>",
                warning.reason,
                warning.actor_id,
                warning.created_at.timestamp()
            ),
            false,
        );
    }
    embed
}

pub fn warning_removed_embed(
    guild_id: u64,
    user: &serenity::User,
    warning: &Warning,
    actor_id: u64,
) -> CreateEmbed {
    CreateEmbed::default()
        .title("Warning removed")
        .description(format!(
            "Warning `#{}` for <@{}> has been removed.",
            warning.case_id, user.id
        ))
        .color(GREEN)
        .thumbnail(user.face())
        .field("Case ID", format!("`#{}`", warning.case_id), true)
        .field("User", format!("{} (`{}`)", user.name, user.id), true)
        .field("Moderator", format!("<@{}>", actor_id), true)
        .field("Original reason", warning.reason.as_str(), false)
        .footer(footer(guild_id))
        .timestamp(serenity::Timestamp::now())
}

/// Every case that targeted a user, newest first.
pub fn history_embed(guild_id: u64, user: &serenity::User, cases: &[Case]) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(format!("Moderation history for {}", user.name))
        .thumbnail(user.face())
        .color(BLURPLE)
        .footer(footer(guild_id))
        .timestamp(serenity::Timestamp::now());

    if cases.is_empty() {
        return embed.description(format!("<@{}> has no recorded cases.", user.id));
    }

    embed = embed.description(format!("**{}** case(s) on record.", cases.len()));
    for case in cases.iter().rev().take(MAX_FIELDS) {
        let (emoji, label, _) = kind_style(case.kind());
        let status = if case.active { "" } else { " (inactive)" };
        embed = embed.field(
            format!("{} #{} {}{}", emoji, case.case_id, label, status),
            format!(
                "{}\nby <@{}> <t:{}:R>",
                case.reason,
                case.actor_id,
                case.created_at.timestamp()
            ),
            false,
        );
    }
    embed
}

/// Sent to the report channel for moderators.
pub fn report_embed(guild_id: u64, case: &Case, reported: &serenity::User) -> CreateEmbed {
    CreateEmbed::default()
        .title("🚨 New report")
        .description(format!("<@{}> was reported.", reported.id))
        .color(RED)
        .thumbnail(reported.face())
        .field("Case ID", format!("`#{}`", case.case_id), true)
        .field("Reported user", format!("<@{}> (`{}`)", reported.id, reported.id), true)
        .field("Reported by", format!("<@{}>", case.actor_id), true)
        .field("Reason", case.reason.as_str(), false)
        .footer(footer(guild_id))
        .timestamp(serenity::Timestamp::now())
}

/// DM for a warned member.
pub fn warn_notice(guild_name: &str, case: &Case) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("You have been warned - Case #{}", case.case_id))
        .description(format!("You received a warning in **{}**.", guild_name))
        .color(YELLOW)
        .field("Reason", case.reason.as_str(), false)
        .field("Moderator", format!("<@{}>", case.actor_id), false)
        .timestamp(serenity::Timestamp::now())
}

pub fn permissions_embed(role: &serenity::Role, commands: &BTreeSet<String>) -> CreateEmbed {
    let list = commands
        .iter()
        .map(|command| format!("• `/{}`", command))
        .collect::<Vec<_>>()
        .join("\n");

    CreateEmbed::default()
        .title(format!("Permissions for {}", role.name))
        .description(list)
        .color(role.colour)
        .footer(footer(role.guild_id.get()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::{GuildLedger, CHANNEL_SUBJECT};
    use chrono::Utc;

    #[test]
    fn test_every_kind_has_a_label() {
        for kind in CaseKind::ALL {
            let (emoji, label, _) = kind_style(kind);
            assert!(!emoji.is_empty());
            assert!(label.to_lowercase().starts_with(&kind.as_str()[..2]));
        }
    }

    #[test]
    fn test_extras_follow_case_kind() {
        assert_eq!(
            case_extras(&CaseAction::Timeout {
                duration_minutes: 30
            }),
            vec![("Duration", "30 minutes".to_string())]
        );
        assert_eq!(
            case_extras(&CaseAction::Ban { days_deleted: 2 }),
            vec![("Messages", "2 day(s) deleted".to_string())]
        );
        assert!(case_extras(&CaseAction::Kick).is_empty());
        assert!(case_extras(&CaseAction::Lock { channel_id: 3 }).is_empty());
    }

    #[test]
    fn test_target_is_channel_for_channel_cases() {
        let mut ledger = GuildLedger::default();
        let lock = ledger.append_case(
            CaseAction::Lock { channel_id: 900 },
            CHANNEL_SUBJECT,
            1,
            None,
            Utc::now(),
        );
        let kick = ledger.append_case(CaseAction::Kick, 42, 1, None, Utc::now());

        assert_eq!(case_target(&lock), ("Channel", "<#900>".to_string()));
        assert_eq!(case_target(&kick), ("User", "<@42> (`42`)".to_string()));
    }
}
