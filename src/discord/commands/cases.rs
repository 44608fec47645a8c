// Case lookups and member reports.

use crate::core::ledger::CaseAction;
use crate::discord::moderation::case_formatter::{case_details, history_embed, report_embed};
use crate::discord::moderation::guard::{guild_id, record_case, reply_ephemeral};
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Show the details of a case.
#[poise::command(slash_command, guild_only)]
pub async fn case(
    ctx: Context<'_>,
    #[description = "Case ID"] case_id: u64,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let Some(case) = ctx.data().ledger.get_case(guild_id, case_id).await else {
        return reply_ephemeral(ctx, "❌ Case not found.").await;
    };

    ctx.send(poise::CreateReply::default().embed(case_details(guild_id, &case)))
        .await?;
    Ok(())
}

/// List every case recorded against a member.
#[poise::command(slash_command, guild_only)]
pub async fn history(
    ctx: Context<'_>,
    #[description = "Member to look up"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let cases = ctx
        .data()
        .ledger
        .cases_for_subject(guild_id, user.id.get())
        .await;

    ctx.send(poise::CreateReply::default().embed(history_embed(guild_id, &user, &cases)))
        .await?;
    Ok(())
}

/// Report a member to the moderators.
#[poise::command(slash_command, guild_only)]
pub async fn report(
    ctx: Context<'_>,
    #[description = "Member to report"] user: serenity::User,
    #[description = "What happened"] reason: String,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let Some(report_channel_id) = ctx
        .data()
        .ledger
        .config(guild_id)
        .await
        .and_then(|config| config.report_channel_id)
    else {
        return reply_ephemeral(
            ctx,
            "❌ No report channel is configured. An admin needs to run `/setreportchannel`.",
        )
        .await;
    };

    let report_channel = serenity::ChannelId::new(report_channel_id);
    if report_channel.to_channel(ctx.serenity_context()).await.is_err() {
        return reply_ephemeral(ctx, "❌ The report channel could not be found.").await;
    }

    let Some(case) = record_case(ctx, CaseAction::Report, user.id.get(), Some(reason)).await?
    else {
        return Ok(());
    };

    if let Err(e) = report_channel
        .send_message(
            ctx.http(),
            serenity::CreateMessage::new().embed(report_embed(guild_id, &case, &user)),
        )
        .await
    {
        tracing::warn!(
            guild_id,
            case_id = case.case_id,
            "Failed to deliver report: {}",
            e
        );
        return reply_ephemeral(
            ctx,
            format!(
                "⚠️ Report recorded as case `#{}`, but it could not be posted to the report channel.",
                case.case_id
            ),
        )
        .await;
    }

    let confirmation = serenity::CreateEmbed::default()
        .title("✅ Report sent")
        .description(format!(
            "Your report about **{}** was forwarded to the moderators.",
            user.name
        ))
        .color(0x57F287)
        .field("Case ID", format!("`#{}`", case.case_id), false);

    ctx.send(
        poise::CreateReply::default()
            .embed(confirmation)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
