// Member sanctions: ban, unban, kick, timeout, untimeout.

use crate::core::ledger::CaseAction;
use crate::discord::moderation::case_formatter::action_embed;
use crate::discord::moderation::guard::{
    action_failed, announce_case, audit_reason, record_case, reply_ephemeral, require_permission,
    NOT_IN_GUILD,
};
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Longest timeout Discord allows, 28 days.
const MAX_TIMEOUT_MINUTES: u32 = 40_320;
const MAX_BAN_DELETE_DAYS: u8 = 7;

/// Ban a user from the server.
#[poise::command(slash_command, guild_only)]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "User to ban"] user: serenity::User,
    #[description = "Reason for the ban"] reason: Option<String>,
    #[description = "Delete their messages from the last X days (0-7)"]
    #[min = 0]
    #[max = 7]
    days: Option<u8>,
) -> Result<(), Error> {
    if !require_permission(ctx, "ban").await? {
        return Ok(());
    }

    let days = days.unwrap_or(0);
    if days > MAX_BAN_DELETE_DAYS {
        return reply_ephemeral(ctx, "⚠️ Days must be between 0 and 7.").await;
    }

    let guild_id = ctx.guild_id().ok_or(NOT_IN_GUILD)?;
    if let Err(e) = guild_id
        .ban_with_reason(
            ctx.http(),
            user.id,
            days,
            audit_reason(ctx, reason.as_deref()),
        )
        .await
    {
        return action_failed(ctx, "ban this user", e).await;
    }

    let Some(case) = record_case(
        ctx,
        CaseAction::Ban { days_deleted: days },
        user.id.get(),
        reason,
    )
    .await?
    else {
        return Ok(());
    };

    announce_case(
        ctx,
        action_embed(
            guild_id.get(),
            &case,
            "User banned",
            format!("**{}** was banned.", user.name),
        ),
    )
    .await
}

/// Lift a ban.
#[poise::command(slash_command, guild_only)]
pub async fn unban(
    ctx: Context<'_>,
    #[description = "User (or user ID) to unban"] user: serenity::User,
    #[description = "Reason for the unban"] reason: Option<String>,
) -> Result<(), Error> {
    if !require_permission(ctx, "unban").await? {
        return Ok(());
    }

    let guild_id = ctx.guild_id().ok_or(NOT_IN_GUILD)?;
    if let Err(e) = guild_id.unban(ctx.http(), user.id).await {
        return action_failed(ctx, "unban this user", e).await;
    }

    let Some(case) = record_case(ctx, CaseAction::Unban, user.id.get(), reason).await? else {
        return Ok(());
    };

    announce_case(
        ctx,
        action_embed(
            guild_id.get(),
            &case,
            "User unbanned",
            format!("**{}** was unbanned.", user.name),
        ),
    )
    .await
}

/// Kick a member from the server.
#[poise::command(slash_command, guild_only)]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "Member to kick"] user: serenity::User,
    #[description = "Reason for the kick"] reason: Option<String>,
) -> Result<(), Error> {
    if !require_permission(ctx, "kick").await? {
        return Ok(());
    }

    let guild_id = ctx.guild_id().ok_or(NOT_IN_GUILD)?;
    let audit = audit_reason(ctx, reason.as_deref());
    if let Err(e) = guild_id.kick_with_reason(ctx.http(), user.id, &audit).await {
        return action_failed(ctx, "kick this user", e).await;
    }

    let Some(case) = record_case(ctx, CaseAction::Kick, user.id.get(), reason).await? else {
        return Ok(());
    };

    announce_case(
        ctx,
        action_embed(
            guild_id.get(),
            &case,
            "User kicked",
            format!("**{}** was kicked.", user.name),
        ),
    )
    .await
}

/// Time out a member.
#[poise::command(slash_command, guild_only)]
pub async fn timeout(
    ctx: Context<'_>,
    #[description = "Member to time out"] user: serenity::User,
    #[description = "Duration in minutes (1-40320)"]
    #[min = 1]
    #[max = 40320]
    minutes: u32,
    #[description = "Reason for the timeout"] reason: Option<String>,
) -> Result<(), Error> {
    if !require_permission(ctx, "timeout").await? {
        return Ok(());
    }

    if !(1..=MAX_TIMEOUT_MINUTES).contains(&minutes) {
        return reply_ephemeral(ctx, "⚠️ Duration must be between 1 and 40320 minutes.").await;
    }

    let guild_id = ctx.guild_id().ok_or(NOT_IN_GUILD)?;
    let until = serenity::Timestamp::from_unix_timestamp(
        chrono::Utc::now().timestamp() + i64::from(minutes) * 60,
    )
    .map_err(|e| Error::from(e.to_string()))?;
    let audit = audit_reason(ctx, reason.as_deref());

    if let Err(e) = guild_id
        .edit_member(
            ctx.http(),
            user.id,
            serenity::EditMember::new()
                .disable_communication_until_datetime(until)
                .audit_log_reason(&audit),
        )
        .await
    {
        return action_failed(ctx, "time out this user", e).await;
    }

    let Some(case) = record_case(
        ctx,
        CaseAction::Timeout {
            duration_minutes: minutes,
        },
        user.id.get(),
        reason,
    )
    .await?
    else {
        return Ok(());
    };

    announce_case(
        ctx,
        action_embed(
            guild_id.get(),
            &case,
            "User timed out",
            format!("<@{}> was timed out.", user.id),
        ),
    )
    .await
}

/// Remove a member's timeout.
#[poise::command(slash_command, guild_only)]
pub async fn untimeout(
    ctx: Context<'_>,
    #[description = "Member to release"] user: serenity::User,
    #[description = "Reason"] reason: Option<String>,
) -> Result<(), Error> {
    if !require_permission(ctx, "untimeout").await? {
        return Ok(());
    }

    let guild_id = ctx.guild_id().ok_or(NOT_IN_GUILD)?;
    let audit = audit_reason(ctx, reason.as_deref());

    if let Err(e) = guild_id
        .edit_member(
            ctx.http(),
            user.id,
            serenity::EditMember::new()
                .enable_communication()
                .audit_log_reason(&audit),
        )
        .await
    {
        return action_failed(ctx, "remove this timeout", e).await;
    }

    let Some(case) = record_case(ctx, CaseAction::Untimeout, user.id.get(), reason).await? else {
        return Ok(());
    };

    announce_case(
        ctx,
        action_embed(
            guild_id.get(),
            &case,
            "Timeout removed",
            format!("<@{}> can talk again.", user.id),
        ),
    )
    .await
}
