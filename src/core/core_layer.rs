// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "ledger/mod.rs"]
pub mod ledger;
