// Channel moderation: lock, unlock, clear.

use crate::core::ledger::{CaseAction, CHANNEL_SUBJECT};
use crate::discord::moderation::case_formatter::action_embed;
use crate::discord::moderation::guard::{
    action_failed, announce_case, record_case, reply_ephemeral, require_permission, NOT_IN_GUILD,
};
use crate::discord::{Context, Error};
use poise::serenity_prelude::{
    self as serenity, PermissionOverwrite, PermissionOverwriteType, Permissions,
};

/// The @everyone overwrite on a channel, or an empty one if none is set.
fn everyone_overwrite(channel: &serenity::GuildChannel, everyone: serenity::RoleId) -> PermissionOverwrite {
    let kind = PermissionOverwriteType::Role(everyone);
    channel
        .permission_overwrites
        .iter()
        .find(|overwrite| overwrite.kind == kind)
        .cloned()
        .unwrap_or(PermissionOverwrite {
            allow: Permissions::empty(),
            deny: Permissions::empty(),
            kind,
        })
}

/// Deny sending messages while keeping every other setting.
fn locked(mut overwrite: PermissionOverwrite) -> PermissionOverwrite {
    overwrite.allow.remove(Permissions::SEND_MESSAGES);
    overwrite.deny.insert(Permissions::SEND_MESSAGES);
    overwrite
}

/// Drop the send-messages deny. `None` means the overwrite is now empty and
/// should be deleted.
fn unlocked(mut overwrite: PermissionOverwrite) -> Option<PermissionOverwrite> {
    overwrite.deny.remove(Permissions::SEND_MESSAGES);
    if overwrite.allow.is_empty() && overwrite.deny.is_empty() {
        None
    } else {
        Some(overwrite)
    }
}

async fn target_channel(
    ctx: Context<'_>,
    channel: Option<serenity::GuildChannel>,
) -> Result<serenity::GuildChannel, Error> {
    match channel {
        Some(channel) => Ok(channel),
        None => Ok(ctx
            .guild_channel()
            .await
            .ok_or("This command must be used in a server text channel")?),
    }
}

/// Stop @everyone from sending messages in a channel.
#[poise::command(slash_command, guild_only)]
pub async fn lock(
    ctx: Context<'_>,
    #[description = "Channel to lock (defaults to this one)"]
    #[channel_types("Text")]
    channel: Option<serenity::GuildChannel>,
    #[description = "Reason for the lock"] reason: Option<String>,
) -> Result<(), Error> {
    if !require_permission(ctx, "lock").await? {
        return Ok(());
    }

    let guild_id = ctx.guild_id().ok_or(NOT_IN_GUILD)?;
    let channel = target_channel(ctx, channel).await?;
    let everyone = serenity::RoleId::new(guild_id.get());

    if let Err(e) = channel
        .id
        .create_permission(ctx.http(), locked(everyone_overwrite(&channel, everyone)))
        .await
    {
        return action_failed(ctx, "lock this channel", e).await;
    }

    let Some(case) = record_case(
        ctx,
        CaseAction::Lock {
            channel_id: channel.id.get(),
        },
        CHANNEL_SUBJECT,
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
            "🔒 Channel locked",
            format!("<#{}> has been locked.", channel.id),
        ),
    )
    .await
}

/// Let @everyone send messages in a channel again.
#[poise::command(slash_command, guild_only)]
pub async fn unlock(
    ctx: Context<'_>,
    #[description = "Channel to unlock (defaults to this one)"]
    #[channel_types("Text")]
    channel: Option<serenity::GuildChannel>,
    #[description = "Reason for the unlock"] reason: Option<String>,
) -> Result<(), Error> {
    if !require_permission(ctx, "unlock").await? {
        return Ok(());
    }

    let guild_id = ctx.guild_id().ok_or(NOT_IN_GUILD)?;
    let channel = target_channel(ctx, channel).await?;
    let everyone = serenity::RoleId::new(guild_id.get());

    let applied = match unlocked(everyone_overwrite(&channel, everyone)) {
        Some(overwrite) => channel.id.create_permission(ctx.http(), overwrite).await,
        None => {
            channel
                .id
                .delete_permission(ctx.http(), PermissionOverwriteType::Role(everyone))
                .await
        }
    };
    if let Err(e) = applied {
        return action_failed(ctx, "unlock this channel", e).await;
    }

    let Some(case) = record_case(
        ctx,
        CaseAction::Unlock {
            channel_id: channel.id.get(),
        },
        CHANNEL_SUBJECT,
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
            "🔓 Channel unlocked",
            format!("<#{}> has been unlocked.", channel.id),
        ),
    )
    .await
}

/// Delete recent messages in this channel.
#[poise::command(slash_command, guild_only)]
pub async fn clear(
    ctx: Context<'_>,
    #[description = "Number of messages to delete (1-100)"]
    #[min = 1]
    #[max = 100]
    amount: u8,
) -> Result<(), Error> {
    if !require_permission(ctx, "clear").await? {
        return Ok(());
    }

    if !(1..=100).contains(&amount) {
        return reply_ephemeral(ctx, "⚠️ Amount must be between 1 and 100.").await;
    }

    let guild_id = ctx.guild_id().ok_or(NOT_IN_GUILD)?;
    let channel_id = ctx.channel_id();
    ctx.defer_ephemeral().await?;

    let messages = match channel_id
        .messages(ctx.http(), serenity::GetMessages::new().limit(amount))
        .await
    {
        Ok(messages) => messages,
        Err(e) => return action_failed(ctx, "read messages here", e).await,
    };

    // Bulk delete needs at least two ids and rejects messages older than 14 days.
    let deleted = match messages.as_slice() {
        [] => Ok(()),
        [single] => channel_id.delete_message(ctx.http(), single.id).await,
        many => channel_id.delete_messages(ctx.http(), many).await,
    };
    if let Err(e) = deleted {
        return action_failed(ctx, "delete these messages (older than 14 days?)", e).await;
    }

    let count = messages.len() as u32;
    let Some(case) = record_case(
        ctx,
        CaseAction::Clear {
            channel_id: channel_id.get(),
            message_count: count,
        },
        CHANNEL_SUBJECT,
        Some(format!("{} messages deleted", count)),
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
            "🗑️ Messages deleted",
            format!("**{}** messages were deleted in <#{}>.", count, channel_id),
        ),
    )
    .await
}
