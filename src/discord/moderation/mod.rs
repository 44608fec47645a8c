// Discord side of the moderation ledger: embeds and the shared command guard.

pub mod case_formatter;
pub mod guard;
