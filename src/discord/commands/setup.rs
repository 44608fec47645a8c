// Server setup: role permissions, log channel, report channel.

use crate::core::ledger::{normalize_command, LedgerError, MODERATION_COMMANDS};
use crate::discord::moderation::case_formatter::permissions_embed;
use crate::discord::moderation::guard::{guild_id, reply_ephemeral, report_ledger_error};
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Allow or deny a role a moderation command.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn setpermission(
    ctx: Context<'_>,
    #[description = "Role to configure"] role: serenity::Role,
    #[description = "Command name, e.g. ban"] command: String,
    #[description = "Allow (true) or deny (false)"] allow: bool,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let ledger = &ctx.data().ledger;

    let changed = if allow {
        ledger.grant(guild_id, role.id.get(), &command).await
    } else {
        ledger.revoke(guild_id, role.id.get(), &command).await
    };

    let changed = match changed {
        Ok(changed) => changed,
        Err(LedgerError::InvalidArgument(message)) => {
            return reply_ephemeral(
                ctx,
                format!(
                    "❌ {}. Available commands: {}",
                    message,
                    MODERATION_COMMANDS.join(", ")
                ),
            )
            .await;
        }
        Err(e) => return report_ledger_error(ctx, &e).await,
    };

    let command = normalize_command(&command);
    let message = match (allow, changed) {
        (true, true) => format!("✅ <@&{}> can now use `/{}`.", role.id, command),
        (true, false) => format!("ℹ️ <@&{}> could already use `/{}`.", role.id, command),
        (false, true) => format!("✅ <@&{}> can no longer use `/{}`.", role.id, command),
        (false, false) => format!("ℹ️ <@&{}> was not allowed to use `/{}`.", role.id, command),
    };
    reply_ephemeral(ctx, message).await
}

/// Show which moderation commands a role may use.
#[poise::command(slash_command, guild_only)]
pub async fn permissions(
    ctx: Context<'_>,
    #[description = "Role to look up"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let configured = ctx
        .data()
        .ledger
        .config(guild_id)
        .await
        .is_some_and(|config| !config.permissions.is_empty());
    if !configured {
        return reply_ephemeral(ctx, "❌ No role permissions are configured.").await;
    }

    let commands = ctx
        .data()
        .ledger
        .list_permissions(guild_id, role.id.get())
        .await;
    if commands.is_empty() {
        return reply_ephemeral(ctx, format!("❌ <@&{}> has no permissions.", role.id)).await;
    }

    ctx.send(poise::CreateReply::default().embed(permissions_embed(&role, &commands)))
        .await?;
    Ok(())
}

/// Set the channel moderation actions are logged to.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn setlogchannel(
    ctx: Context<'_>,
    #[description = "Log channel"]
    #[channel_types("Text")]
    channel: serenity::Channel,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let channel_id = channel.id().get();

    if let Err(e) = ctx
        .data()
        .ledger
        .set_log_channel(guild_id, channel_id)
        .await
    {
        return report_ledger_error(ctx, &e).await;
    }
    reply_ephemeral(ctx, format!("✅ Log channel set to <#{}>.", channel_id)).await
}

/// Set the channel member reports are sent to.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn setreportchannel(
    ctx: Context<'_>,
    #[description = "Report channel"]
    #[channel_types("Text")]
    channel: serenity::Channel,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let channel_id = channel.id().get();

    if let Err(e) = ctx
        .data()
        .ledger
        .set_report_channel(guild_id, channel_id)
        .await
    {
        return report_ledger_error(ctx, &e).await;
    }
    reply_ephemeral(ctx, format!("✅ Report channel set to <#{}>.", channel_id)).await
}
