use snafu::Snafu;

use crate::notification::{TxFailure, TxPhase};

/// Represents errors that can occur while submitting transactions and waiting for their
/// terminal outcome.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The transaction reached a terminal state and was rejected by the chain.
    ///
    /// The failure is either a decoded module error (`section.name`) or an opaque message.
    #[snafu(display("Transaction failed: {failure}"))]
    TransactionFailed {
        /// The decoded failure.
        failure: TxFailure,
    },

    /// A terminal notification carried neither a success nor a failure marker event.
    #[snafu(display("Unexpected transaction result: status = {phase}"))]
    ProtocolInconsistency {
        /// The phase of the offending notification.
        phase: TxPhase,
    },

    /// The provider closed the notification stream before a terminal notification arrived.
    #[snafu(display("Subscription ended before the transaction reached a terminal state"))]
    SubscriptionEnded,

    /// An event signature was not of the form `section.method`.
    #[snafu(display(
        "Incorrect event signature '{signature}'. A signature is palletName.eventName."
    ))]
    InvalidEventSignature {
        /// The rejected signature.
        signature: String,
    },

    /// No event matching the signature was emitted.
    #[snafu(display("Target event '{signature}' was not found"))]
    EventNotFound {
        /// The signature that was looked up.
        signature: String,
    },

    /// The node provider reported an error.
    #[snafu(display("Provider error: {source}"))]
    Provider {
        /// The underlying provider error.
        source: ProviderError,
    },

    /// A spawned watch task panicked or was cancelled.
    #[snafu(display("Watch task failed: {source}"))]
    WatchTask {
        /// The underlying join error.
        source: tokio::task::JoinError,
    },

    /// The task resolving an outstanding outcome went away without reporting.
    #[snafu(display("Outcome channel closed before the watch task reported"))]
    OutcomeDropped,

    /// At least one member of a batch did not succeed.
    #[snafu(display("{failed} of {total} batch transactions failed"))]
    BatchFailed {
        /// Number of failed members.
        failed: usize,
        /// Number of members in the batch, skipped ones included.
        total: usize,
    },
}

/// Transport-level errors reported by a node provider.
///
/// These surface either from the provider calls themselves or as items of a
/// notification stream, in which case the affected submission is treated as failed.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// The RPC connection or a request over it failed.
    #[snafu(display("RPC error: {message}"))]
    Rpc {
        /// Description of the failure.
        message: String,
    },

    /// The node refused to accept the transaction into its pool.
    #[snafu(display("Transaction rejected by the node: {message}"))]
    Rejected {
        /// Description of the rejection.
        message: String,
    },
}

/// Type alias for results that return a `Result<T, Error>`, simplifying error handling.
pub type Result<T, E = Error> = std::result::Result<T, E>;
