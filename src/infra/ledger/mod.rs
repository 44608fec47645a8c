#[cfg(test)]
pub mod in_memory;
pub mod json_store;

#[cfg(test)]
pub use in_memory::InMemoryLedgerStore;
pub use json_store::JsonLedgerStore;
