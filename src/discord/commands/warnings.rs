// Warnings: warn, unwarn, warns.

use crate::core::ledger::WarningRemoval;
use crate::discord::moderation::case_formatter::{
    action_embed, warn_notice, warning_removed_embed, warnings_embed,
};
use crate::discord::moderation::guard::{
    announce_case, guild_id, reply_ephemeral, report_ledger_error, require_permission,
};
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Warn a member. They get a DM with the reason.
#[poise::command(slash_command, guild_only)]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "Member to warn"] user: serenity::User,
    #[description = "Reason for the warning"] reason: String,
) -> Result<(), Error> {
    if !require_permission(ctx, "warn").await? {
        return Ok(());
    }

    let guild_id = guild_id(ctx)?;
    let receipt = match ctx
        .data()
        .ledger
        .warn(guild_id, user.id.get(), ctx.author().id.get(), Some(reason))
        .await
    {
        Ok(receipt) => receipt,
        Err(e) => return report_ledger_error(ctx, &e).await,
    };

    let embed = action_embed(
        guild_id,
        &receipt.case,
        "User warned",
        format!("<@{}> has been warned.", user.id),
    )
    .thumbnail(user.face())
    .field("Active warnings", receipt.warn_count.to_string(), true);
    announce_case(ctx, embed).await?;

    let guild_name = ctx
        .guild()
        .map(|guild| guild.name.clone())
        .unwrap_or_else(|| "this server".to_string());
    let notice = serenity::CreateMessage::new().embed(warn_notice(&guild_name, &receipt.case));
    if let Err(e) = user.direct_message(ctx.http(), notice).await {
        // Closed DMs are common; the warning stands either way.
        tracing::warn!(user_id = user.id.get(), "Could not DM warning: {}", e);
    }

    Ok(())
}

/// Remove a warning by its case ID.
#[poise::command(slash_command, guild_only)]
pub async fn unwarn(
    ctx: Context<'_>,
    #[description = "Member the warning belongs to"] user: serenity::User,
    #[description = "Case ID of the warning"] case_id: u64,
) -> Result<(), Error> {
    if !require_permission(ctx, "unwarn").await? {
        return Ok(());
    }

    let guild_id = guild_id(ctx)?;
    let removal = match ctx
        .data()
        .ledger
        .remove_warning(guild_id, user.id.get(), case_id)
        .await
    {
        Ok(removal) => removal,
        Err(e) => return report_ledger_error(ctx, &e).await,
    };

    match removal {
        WarningRemoval::Removed(warning) => {
            let embed = warning_removed_embed(guild_id, &user, &warning, ctx.author().id.get());
            announce_case(ctx, embed).await
        }
        WarningRemoval::NoWarnings => {
            reply_ephemeral(ctx, "⚠️ This user has no warnings.").await
        }
        WarningRemoval::NotFound => {
            reply_ephemeral(ctx, "❌ No warning with that case ID was found for this user.").await
        }
    }
}

/// Show a member's active warnings.
#[poise::command(slash_command, guild_only)]
pub async fn warns(
    ctx: Context<'_>,
    #[description = "Member to look up"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let warnings = ctx
        .data()
        .ledger
        .list_warnings(guild_id, user.id.get())
        .await;

    ctx.send(poise::CreateReply::default().embed(warnings_embed(guild_id, &user, &warnings)))
        .await?;
    Ok(())
}
