//! Infrastructure Adapters
//!
//! Implementations of domain ports for external systems.

pub mod postgres;
pub mod provider;

#[cfg(test)]
pub mod in_memory;

// Re-exports
pub use postgres::PgCallRepository;
pub use provider::HttpCallInitiator;
