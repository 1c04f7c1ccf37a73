//! The capability set the harness expects from a node connection.
//!
//! A provider accepts a call plus a signer and an optional nonce, signs and submits it,
//! and hands back a [`Subscription`] that yields status notifications until the
//! transaction is included, finalized or dropped.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::ProviderError;
use crate::extractor::ErrorMetadata;
use crate::notification::Notification;

/// Stream of status notifications for one submission.
///
/// An `Err` item is a transport-level failure of the subscription itself.
pub type NotificationStream = BoxStream<'static, Result<Notification, ProviderError>>;

/// Releases a subscription. Runs its callback at most once.
pub struct Unsubscribe(Option<Box<dyn FnOnce() + Send>>);

impl Unsubscribe {
    /// Wraps a release callback.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(release)))
    }

    /// A handle with nothing to release.
    pub fn noop() -> Self {
        Self(None)
    }

    /// Runs the release callback if it has not run yet.
    ///
    /// Returns `true` if the callback ran on this call.
    pub fn release(&mut self) -> bool {
        match self.0.take() {
            Some(release) => {
                release();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("pending", &self.0.is_some())
            .finish()
    }
}

/// A live status subscription for one submitted transaction.
pub struct Subscription {
    /// Status notifications, in chain order.
    pub stream: NotificationStream,
    /// Handle releasing the subscription on the node.
    pub unsubscribe: Unsubscribe,
}

impl Subscription {
    /// Creates a subscription from a stream and its release handle.
    pub fn new(stream: NotificationStream, unsubscribe: Unsubscribe) -> Self {
        Self {
            stream,
            unsubscribe,
        }
    }
}

/// A node connection able to submit signed transactions and report their progress.
#[async_trait]
pub trait TxProvider: Send + Sync {
    /// The signing identity.
    type Signer: Send + Sync;

    /// An unsigned call.
    type Call: Send;

    /// Returns the next sequence number (nonce) the chain expects from `signer`.
    async fn next_sequence_number(&self, signer: &Self::Signer) -> Result<u64, ProviderError>;

    /// Signs `call` with `signer` and submits it.
    ///
    /// With `nonce` set to `None` the provider picks the nonce itself.
    async fn submit(
        &self,
        call: Self::Call,
        signer: &Self::Signer,
        nonce: Option<u64>,
    ) -> Result<Subscription, ProviderError>;

    /// Returns the lookup used to decode module errors.
    fn error_metadata(&self) -> Arc<dyn ErrorMetadata>;
}
