// Core moderation ledger - cases, warnings, role permissions and channel config.
// Same shape as the other core modules: models, a store port, and the service.

pub mod ledger_models;
pub mod ledger_service;
pub mod ledger_store;
pub mod permission_resolver;
pub mod retry;

pub use ledger_models::*;
pub use ledger_service::*;
pub use ledger_store::*;
pub use permission_resolver::{Actor, PermissionDecision};
pub use retry::RetryPolicy;
