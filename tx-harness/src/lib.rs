//! # Transaction Submission Harness
//!
//! This library submits signed transactions to a Substrate-style node and works out,
//! asynchronously, whether each one ultimately succeeded, failed, or is still pending
//! inclusion/finalization.
//!
//! ## Modules
//! - [`notification`]: The status notifications a node pushes for one submission.
//! - [`classifier`]: Maps a single notification onto pending/success/failure.
//! - [`extractor`]: Pulls domain events and module errors out of terminal notifications.
//! - [`controller`]: Drives one submission's notification stream to exactly one outcome.
//! - [`submitter`]: Fires batches of transactions from one signer with sequential nonces.
//! - [`provider`]: The capability set expected from a node connection.

/// Error handling module.
///
/// Defines the error types, built with `snafu`, for every failure mode the harness
/// can surface to a caller.
pub mod error;

/// Status notification data model.
pub mod notification;

/// Status classification of individual notifications.
pub mod classifier;

/// Event lookup and module error decoding.
pub mod extractor;

/// Completion controller.
///
/// Watches one submission's notification stream and resolves it exactly once, either
/// through callbacks or through a single outstanding result slot.
pub mod controller;

/// Nonce-sequenced batch submission.
pub mod submitter;

/// Node provider boundary.
pub mod provider;

#[cfg(test)]
mod mock;

pub use classifier::{classify, TxStatus};
pub use controller::{
    ensure_success,
    ensure_success_promise,
    wait_for_outcome,
    watch,
    CompletionController,
    PendingOutcome,
    WatchState,
};
pub use error::{Error, ProviderError, Result};
pub use extractor::{decode_module_error, find_event, ErrorMetadata, ErrorTable, Unrecoverable};
pub use notification::{
    CompletionOutcome,
    DispatchError,
    EventField,
    EventRecord,
    ModuleErrorName,
    Notification,
    TxFailure,
    TxPhase,
};
pub use provider::{NotificationStream, Subscription, TxProvider, Unsubscribe};
pub use submitter::{BatchReport, BatchSubmitter, MemberOutcome, SequenceCounter};
