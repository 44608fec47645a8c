// Discord commands module.
// Each group of moderation commands gets its own file.

pub mod cases;
pub mod channels;
pub mod sanctions;
pub mod setup;
pub mod warnings;

use crate::core::ledger::GuildStateStore;
use crate::infra::ledger::JsonLedgerStore;
use std::sync::Arc;

/// Shared state handed to every command.
pub struct Data {
    pub ledger: Arc<GuildStateStore<JsonLedgerStore>>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Every slash command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        sanctions::ban(),
        sanctions::unban(),
        sanctions::kick(),
        sanctions::timeout(),
        sanctions::untimeout(),
        warnings::warn(),
        warnings::unwarn(),
        warnings::warns(),
        cases::case(),
        cases::history(),
        cases::report(),
        channels::lock(),
        channels::unlock(),
        channels::clear(),
        setup::setpermission(),
        setup::permissions(),
        setup::setlogchannel(),
        setup::setreportchannel(),
    ]
}
