//! # Chain Harness
//!
//! Live-node side of the transaction harness: a `subxt`-backed [`tx_harness::TxProvider`],
//! error names resolved from chain metadata, and the account, whitelist, collection and
//! token helpers scenarios build on.

/// Error handling module.
pub mod error;

/// Dynamic call builders.
pub mod calls;

/// Collection creation data.
pub mod collections;

/// Provider over a `subxt` client.
pub mod provider;

/// Module error lookup in chain metadata.
pub mod metadata;

/// Derived, funded test accounts.
pub mod accounts;

/// Whitelist, collection and token setup.
pub mod state;

/// End-to-end scenarios.
pub mod scenarios;

pub use accounts::AccountsManager;
pub use error::{Error, Result};
pub use metadata::MetadataErrors;
pub use provider::SubxtProvider;
pub use state::StateInitializer;
