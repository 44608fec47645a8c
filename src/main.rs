// This is the entry point of the moderation bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic): the case ledger, warnings,
//   role permissions and the guild state store that owns them
// - `infra/` = Implementations of core traits (JSON files, in-memory)
// - `discord/` = Discord-specific adapters (slash commands)
//
// This file's job is to:
// 1. Load configuration
// 2. Open the ledger (dependency injection)
// 3. Set up the Discord framework and register commands

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;
mod settings;

use crate::core::ledger::GuildStateStore;
use crate::discord::{Data, Error};
use crate::infra::ledger::JsonLedgerStore;
use crate::settings::Settings;
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Log every command error instead of letting it vanish.
async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            tracing::error!(command = %ctx.command().name, "Command failed: {}", error);
            let _ = ctx
                .send(
                    poise::CreateReply::default()
                        .content("❌ Something went wrong while running this command.")
                        .ephemeral(true),
                )
                .await;
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                tracing::error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let settings = Settings::from_env()?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let store = JsonLedgerStore::open(&settings.data_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to open ledger data directory {}",
                settings.data_dir.display()
            )
        })?;
    let ledger = Arc::new(
        GuildStateStore::new(store, settings.retry_policy())
            .await
            .context("Failed to load moderation ledger")?,
    );

    let data = Data { ledger };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MESSAGES;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: discord::commands::all(),
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                tracing::info!(bot = %ready.user.name, "Bot is starting up");

                // Global registration can take a while to propagate.
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                tracing::info!(
                    commands = framework.options().commands.len(),
                    "Commands registered, bot is ready"
                );
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&settings.discord_token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}
