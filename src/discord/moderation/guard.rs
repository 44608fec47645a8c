// Shared plumbing for moderation commands: who is asking, may they, record
// the case, and tell everyone who needs to know.

use crate::core::ledger::{Actor, Case, CaseAction, LedgerError};
use crate::discord::{Context, Error};
use poise::serenity_prelude::{self as serenity, CreateEmbed};

pub const NOT_IN_GUILD: &str = "Must be used in a server";

pub fn guild_id(ctx: Context<'_>) -> Result<u64, Error> {
    Ok(ctx.guild_id().ok_or(NOT_IN_GUILD)?.get())
}

/// Reduce the invoking member to the ids the permission resolver needs.
pub async fn invoking_actor(ctx: Context<'_>) -> Result<Actor, Error> {
    let member = ctx.author_member().await.ok_or(NOT_IN_GUILD)?;

    // Interaction members carry their resolved permissions.
    let is_administrator = member
        .permissions
        .is_some_and(|permissions| permissions.administrator());

    Ok(Actor {
        user_id: member.user.id.get(),
        role_ids: member.roles.iter().map(|role| role.get()).collect(),
        is_administrator,
    })
}

/// Check the guild's role allowlist for `command`. Replies to the user and
/// returns `false` if they aren't allowed.
pub async fn require_permission(ctx: Context<'_>, command: &str) -> Result<bool, Error> {
    let guild_id = guild_id(ctx)?;
    let actor = invoking_actor(ctx).await?;
    let decision = ctx
        .data()
        .ledger
        .resolve_permission(guild_id, &actor, command)
        .await;

    tracing::debug!(
        guild_id,
        user_id = actor.user_id,
        command,
        ?decision,
        "Resolved command permission"
    );

    if !decision.is_allowed() {
        reply_ephemeral(ctx, "❌ You don't have permission to use this command.").await?;
    }
    Ok(decision.is_allowed())
}

pub async fn reply_ephemeral(ctx: Context<'_>, content: impl Into<String>) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(content)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Tell the user why a ledger call failed.
pub async fn report_ledger_error(ctx: Context<'_>, error: &LedgerError) -> Result<(), Error> {
    let message = if error.is_persistence() {
        tracing::error!(error = %error, command = %ctx.command().name, "Ledger write failed");
        "⚠️ This could not be saved to the moderation log. Please try again.".to_string()
    } else {
        format!("❌ {}", error)
    };
    reply_ephemeral(ctx, message).await
}

/// Append a case for the current guild with the invoking user as actor.
/// On failure the user is told and `None` is returned.
pub async fn record_case(
    ctx: Context<'_>,
    action: CaseAction,
    subject_id: u64,
    reason: Option<String>,
) -> Result<Option<Case>, Error> {
    let guild_id = guild_id(ctx)?;
    match ctx
        .data()
        .ledger
        .append_case(guild_id, action, subject_id, ctx.author().id.get(), reason)
        .await
    {
        Ok(case) => Ok(Some(case)),
        Err(e) => {
            report_ledger_error(ctx, &e).await?;
            Ok(None)
        }
    }
}

/// Reply with the case embed and mirror it to the log channel.
pub async fn announce_case(ctx: Context<'_>, embed: CreateEmbed) -> Result<(), Error> {
    ctx.send(poise::CreateReply::default().embed(embed.clone()))
        .await?;
    post_to_log_channel(ctx, embed).await;
    Ok(())
}

/// Best effort: a missing or unreachable log channel never fails the command.
pub async fn post_to_log_channel(ctx: Context<'_>, embed: CreateEmbed) {
    let Some(guild_id) = ctx.guild_id() else {
        return;
    };
    let Some(log_channel_id) = ctx
        .data()
        .ledger
        .config(guild_id.get())
        .await
        .and_then(|config| config.log_channel_id)
    else {
        return;
    };

    if let Err(e) = serenity::ChannelId::new(log_channel_id)
        .send_message(ctx.http(), serenity::CreateMessage::new().embed(embed))
        .await
    {
        tracing::warn!(
            guild_id = guild_id.get(),
            channel_id = log_channel_id,
            "Failed to post to log channel: {}",
            e
        );
    }
}

/// Audit log entry text shown in Discord's own audit log.
pub fn audit_reason(ctx: Context<'_>, reason: Option<&str>) -> String {
    let reason = reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(crate::core::ledger::DEFAULT_REASON);
    format!("{} | Moderator: {}", reason, ctx.author().name)
}

/// Discord refused the action itself; nothing was recorded.
pub async fn action_failed(
    ctx: Context<'_>,
    action: &str,
    error: serenity::Error,
) -> Result<(), Error> {
    tracing::warn!(
        command = %ctx.command().name,
        error = %error,
        "Discord rejected moderation action"
    );
    reply_ephemeral(ctx, format!("❌ Could not {}: {}", action, error)).await
}
