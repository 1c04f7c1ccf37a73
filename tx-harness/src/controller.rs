//! # Completion Controller
//!
//! Wraps one submission and resolves it exactly once. Every notification pulled from the
//! provider goes through [`CompletionController::observe`], which classifies it, releases
//! the subscription on the first terminal notification and ignores anything delivered
//! afterwards.
//!
//! Outcomes can be delivered in several ways, all funnelling through the same state
//! machine:
//! - [`wait_for_outcome`]: await the outcome inline.
//! - [`watch`]: invoke exactly one of two callbacks.
//! - [`ensure_success`]: fire and report; a failure surfaces through the task handle.
//! - [`ensure_success_promise`]: resolve one outstanding result slot.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::classifier::{classify, TxStatus};
use crate::error::{Error, ProviderError, Result, SubscriptionEndedSnafu, TransactionFailedSnafu};
use crate::extractor::{parse_failure, ErrorMetadata};
use crate::notification::{CompletionOutcome, Notification, TxFailure};
use crate::provider::{Subscription, Unsubscribe};

/// Lifecycle of one watched submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Waiting for a terminal notification.
    Watching,
    /// Resolved successfully.
    Succeeded,
    /// Resolved with a failure.
    Failed,
    /// Gave up without an outcome (protocol inconsistency or a closed stream).
    Aborted,
}

/// State machine resolving one submission.
pub struct CompletionController {
    /// Current state.
    state: WatchState,
    /// Releases the subscription once a terminal state is reached.
    unsubscribe: Unsubscribe,
    /// Used to decode module errors of failed transactions.
    metadata: Arc<dyn ErrorMetadata>,
}

impl CompletionController {
    /// Creates a controller in the [`WatchState::Watching`] state.
    pub fn new(unsubscribe: Unsubscribe, metadata: Arc<dyn ErrorMetadata>) -> Self {
        Self {
            state: WatchState::Watching,
            unsubscribe,
            metadata,
        }
    }

    /// Current state.
    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Processes one item of the notification stream.
    ///
    /// Returns `Ok(Some(outcome))` exactly once, for the first terminal notification, and
    /// `Ok(None)` for pending notifications and for anything delivered after the outcome.
    /// A terminal notification without success or failure markers aborts the watch with
    /// [`Error::ProtocolInconsistency`].
    pub fn observe(
        &mut self,
        item: Result<Notification, ProviderError>,
    ) -> Result<Option<CompletionOutcome>> {
        if self.state != WatchState::Watching {
            debug!("Ignoring notification delivered in state {:?}", self.state);
            return Ok(None);
        }

        let notification = match item {
            Ok(notification) => notification,
            Err(err) => {
                error!("❌ Error while watching transaction progress: {err}");
                self.finish(WatchState::Failed);
                return Ok(Some(Err(TxFailure::Unexpected {
                    message: err.to_string(),
                })));
            }
        };

        let status = match classify(&notification) {
            Ok(status) => status,
            Err(err) => {
                error!("❌ {err}");
                self.finish(WatchState::Aborted);
                return Err(err);
            }
        };

        match status {
            TxStatus::Pending => {
                debug!("⏳ Transaction pending: {}", notification.phase);
                Ok(None)
            }
            TxStatus::Success => {
                self.finish(WatchState::Succeeded);
                info!(
                    "✅ Transaction succeeded: {} {}",
                    notification.phase,
                    notification.block_hash.as_deref().unwrap_or_default()
                );
                Ok(Some(Ok(notification)))
            }
            TxStatus::Failed => {
                self.finish(WatchState::Failed);
                let failure = parse_failure(&notification, self.metadata.as_ref());
                warn!("⚠️ Transaction failed: {failure}");
                Ok(Some(Err(failure)))
            }
        }
    }

    /// Gives up on the submission, releasing the subscription if still held.
    pub fn abort(&mut self) {
        if self.state == WatchState::Watching {
            self.finish(WatchState::Aborted);
        }
    }

    /// Enters a terminal state and releases the subscription.
    fn finish(&mut self, state: WatchState) {
        self.state = state;
        self.unsubscribe.release();
    }
}

/// Drives a subscription until its first terminal notification and returns the outcome.
///
/// The returned error is reserved for fatal conditions: a protocol inconsistency or a
/// stream that ended without a terminal notification.
pub async fn wait_for_outcome(
    subscription: Subscription,
    metadata: Arc<dyn ErrorMetadata>,
) -> Result<CompletionOutcome> {
    let Subscription {
        mut stream,
        unsubscribe,
    } = subscription;
    let mut controller = CompletionController::new(unsubscribe, metadata);

    while let Some(item) = stream.next().await {
        if let Some(outcome) = controller.observe(item)? {
            return Ok(outcome);
        }
    }

    controller.abort();
    SubscriptionEndedSnafu.fail()
}

/// Watches a subscription and invokes exactly one of `on_success` or `on_failure`.
///
/// Neither callback runs when the watch aborts on a fatal condition; the error is
/// returned instead.
pub async fn watch<S, F>(
    subscription: Subscription,
    metadata: Arc<dyn ErrorMetadata>,
    on_success: S,
    on_failure: F,
) -> Result<()>
where
    S: FnOnce(Notification),
    F: FnOnce(TxFailure),
{
    match wait_for_outcome(subscription, metadata).await? {
        Ok(notification) => on_success(notification),
        Err(failure) => on_failure(failure),
    }
    Ok(())
}

/// Folds an outcome into a plain result, failures becoming [`Error::TransactionFailed`].
fn into_result(outcome: Result<CompletionOutcome>) -> Result<Notification> {
    match outcome? {
        Ok(notification) => Ok(notification),
        Err(failure) => TransactionFailedSnafu { failure }.fail(),
    }
}

/// Fire-and-report: watches the subscription on a background task.
///
/// Failures are logged and propagated to whoever joins the returned handle.
pub fn ensure_success(
    subscription: Subscription,
    metadata: Arc<dyn ErrorMetadata>,
) -> JoinHandle<Result<Notification>> {
    tokio::spawn(async move {
        let result = into_result(wait_for_outcome(subscription, metadata).await);
        if let Err(err) = &result {
            error!("❌ {err}");
        }
        result
    })
}

/// A single outstanding result slot, resolved by [`ensure_success_promise`].
#[must_use = "the outcome is only observable by awaiting it"]
pub struct PendingOutcome {
    /// Receiving half of the slot.
    receiver: oneshot::Receiver<Result<Notification>>,
}

impl Future for PendingOutcome {
    type Output = Result<Notification>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::OutcomeDropped)))
    }
}

/// Watches the subscription on a background task that resolves the returned slot:
/// success resolves it with the terminal notification, failure rejects it.
pub fn ensure_success_promise(
    subscription: Subscription,
    metadata: Arc<dyn ErrorMetadata>,
) -> PendingOutcome {
    let (sender, receiver) = oneshot::channel();

    tokio::spawn(async move {
        let result = into_result(wait_for_outcome(subscription, metadata).await);
        if sender.send(result).is_err() {
            debug!("Outcome receiver dropped before the transaction resolved");
        }
    });

    PendingOutcome { receiver }
}
