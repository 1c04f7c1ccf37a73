//! # Nonce-Sequenced Submission
//!
//! Fires many transactions from one signer without waiting for earlier ones to confirm.
//! The signer's next nonce is fetched once per batch and threaded through the dispatch
//! loop as a [`SequenceCounter`]; every dispatched transaction gets its own watch task,
//! and the batch resolves once all of them have reached a terminal state.

use std::sync::Arc;

use futures::future::join_all;
use log::{debug, error, info};
use snafu::ResultExt;
use tokio::task::JoinHandle;

use crate::controller::{ensure_success_promise, wait_for_outcome};
use crate::error::{BatchFailedSnafu, Error, ProviderSnafu, Result};
use crate::notification::{CompletionOutcome, Notification, TxFailure};
use crate::provider::TxProvider;

/// Sequence number cursor for one signer within one batch.
///
/// Seeded once from the chain and only advanced by the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceCounter {
    /// First nonce of the batch.
    base: u64,
    /// Next nonce to hand out.
    next: u64,
}

impl SequenceCounter {
    /// Creates a counter starting at `base`.
    pub fn new(base: u64) -> Self {
        Self { base, next: base }
    }

    /// Hands out the next nonce.
    pub fn assign(&mut self) -> u64 {
        let nonce = self.next;
        self.next += 1;
        nonce
    }

    /// First nonce of the batch.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Number of nonces handed out so far.
    pub fn assigned(&self) -> u64 {
        self.next - self.base
    }
}

/// Outcome of one batch member.
#[derive(Debug)]
pub enum MemberOutcome {
    /// Skipped without consuming a nonce.
    Skipped,
    /// Included and executed successfully.
    Succeeded {
        /// Nonce the transaction was sent with.
        nonce: u64,
        /// Terminal notification.
        notification: Notification,
    },
    /// Reached a terminal failure.
    Failed {
        /// Nonce the transaction was sent with.
        nonce: u64,
        /// Decoded failure.
        failure: TxFailure,
    },
    /// Never reached an outcome: rejected at submission or aborted while watching.
    Aborted {
        /// Nonce the transaction was assigned.
        nonce: u64,
        /// What went wrong.
        error: Error,
    },
    /// Not dispatched because an earlier submission was rejected.
    NotDispatched,
}

impl MemberOutcome {
    /// Nonce assigned to this member, if it was dispatched.
    pub fn nonce(&self) -> Option<u64> {
        match self {
            MemberOutcome::Succeeded { nonce, .. }
            | MemberOutcome::Failed { nonce, .. }
            | MemberOutcome::Aborted { nonce, .. } => Some(*nonce),
            MemberOutcome::Skipped | MemberOutcome::NotDispatched => None,
        }
    }

    /// Whether this member counts against the batch.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            MemberOutcome::Failed { .. }
                | MemberOutcome::Aborted { .. }
                | MemberOutcome::NotDispatched
        )
    }

    /// Terminal notification of a successful member.
    pub fn notification(&self) -> Option<&Notification> {
        match self {
            MemberOutcome::Succeeded { notification, .. } => Some(notification),
            _ => None,
        }
    }
}

/// Individual outcomes of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport {
    /// Nonce the batch started from.
    pub base_nonce: u64,
    /// One entry per input operation.
    pub members: Vec<MemberOutcome>,
}

impl BatchReport {
    /// Nonces assigned to members, in dispatch order.
    ///
    /// Includes the nonce of a member whose submission the node refused.
    pub fn nonces(&self) -> Vec<u64> {
        self.members.iter().filter_map(MemberOutcome::nonce).collect()
    }

    /// Number of failed members.
    pub fn failed(&self) -> usize {
        self.members.iter().filter(|member| member.is_failure()).count()
    }

    /// Fails the batch as a whole if any member failed.
    pub fn into_result(self) -> Result<Vec<MemberOutcome>> {
        let failed = self.failed();
        if failed > 0 {
            return BatchFailedSnafu {
                failed,
                total: self.members.len(),
            }
            .fail();
        }
        Ok(self.members)
    }
}

/// A batch member waiting to be resolved.
enum Slot {
    /// Resolved during dispatch.
    Resolved(MemberOutcome),
    /// Watched by a background task.
    Watching {
        /// Nonce the transaction was sent with.
        nonce: u64,
        /// The watch task.
        handle: JoinHandle<Result<CompletionOutcome>>,
    },
}

impl Slot {
    /// Waits for the member's outcome.
    async fn resolve(self) -> MemberOutcome {
        match self {
            Slot::Resolved(outcome) => outcome,
            Slot::Watching { nonce, handle } => match handle.await {
                Ok(Ok(Ok(notification))) => MemberOutcome::Succeeded {
                    nonce,
                    notification,
                },
                Ok(Ok(Err(failure))) => MemberOutcome::Failed { nonce, failure },
                Ok(Err(error)) => MemberOutcome::Aborted { nonce, error },
                Err(source) => MemberOutcome::Aborted {
                    nonce,
                    error: Error::WatchTask { source },
                },
            },
        }
    }
}

/// Submits transactions through a [`TxProvider`], sequencing nonces per batch.
pub struct BatchSubmitter<P> {
    /// The node connection.
    provider: Arc<P>,
}

impl<P> Clone for BatchSubmitter<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<P: TxProvider> BatchSubmitter<P> {
    /// Creates a submitter over `provider`.
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// The underlying provider.
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Dispatches `operations` from `signer` and waits for every dispatched one to resolve.
    ///
    /// `None` entries are skipped without consuming a nonce. Nonces are assigned in input
    /// order starting from the signer's current next nonce; confirmations may arrive in
    /// any order. If the node rejects a submission, nothing after it is dispatched since
    /// a gap in the nonce sequence would park every later transaction.
    pub async fn submit_batch(
        &self,
        signer: &P::Signer,
        operations: Vec<Option<P::Call>>,
    ) -> Result<BatchReport> {
        let base = self
            .provider
            .next_sequence_number(signer)
            .await
            .context(ProviderSnafu)?;
        let mut counter = SequenceCounter::new(base);
        let metadata = self.provider.error_metadata();

        let mut slots = Vec::with_capacity(operations.len());
        let mut halted = false;

        for (index, operation) in operations.into_iter().enumerate() {
            if halted {
                slots.push(Slot::Resolved(MemberOutcome::NotDispatched));
                continue;
            }
            let Some(call) = operation else {
                debug!("Skipping batch member {index}");
                slots.push(Slot::Resolved(MemberOutcome::Skipped));
                continue;
            };

            let nonce = counter.assign();
            match self.provider.submit(call, signer, Some(nonce)).await {
                Ok(subscription) => {
                    debug!("📤 Submitted batch member {index} with nonce {nonce}");
                    let handle = tokio::spawn(wait_for_outcome(subscription, Arc::clone(&metadata)));
                    slots.push(Slot::Watching { nonce, handle });
                }
                Err(source) => {
                    error!("❌ Failed to submit batch member {index} with nonce {nonce}: {source}");
                    halted = true;
                    slots.push(Slot::Resolved(MemberOutcome::Aborted {
                        nonce,
                        error: Error::Provider { source },
                    }));
                }
            }
        }

        info!(
            "📦 Dispatched {} transactions starting at nonce {}",
            counter.assigned(),
            counter.base()
        );

        let members = join_all(slots.into_iter().map(Slot::resolve)).await;
        let report = BatchReport {
            base_nonce: base,
            members,
        };
        if report.failed() > 0 {
            error!(
                "❌ {} of {} batch members failed",
                report.failed(),
                report.members.len()
            );
        }
        Ok(report)
    }

    /// Like [`BatchSubmitter::submit_batch`] for callers that only need the side effects.
    pub async fn submit_batch_ensure(
        &self,
        signer: &P::Signer,
        operations: Vec<Option<P::Call>>,
    ) -> Result<()> {
        self.submit_batch(signer, operations)
            .await?
            .into_result()
            .map(|_| ())
    }

    /// Submits one transaction with an explicitly assigned nonce and waits for it.
    pub async fn submit_with_nonce(
        &self,
        signer: &P::Signer,
        call: P::Call,
        nonce: u64,
    ) -> Result<Notification> {
        self.submit_inner(signer, call, Some(nonce)).await
    }

    /// Submits one transaction, letting the provider pick the nonce, and waits for it.
    pub async fn submit(&self, signer: &P::Signer, call: P::Call) -> Result<Notification> {
        self.submit_inner(signer, call, None).await
    }

    /// Shared single-submission path.
    async fn submit_inner(
        &self,
        signer: &P::Signer,
        call: P::Call,
        nonce: Option<u64>,
    ) -> Result<Notification> {
        let subscription = self
            .provider
            .submit(call, signer, nonce)
            .await
            .context(ProviderSnafu)?;
        ensure_success_promise(subscription, self.provider.error_metadata()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::find_event;
    use crate::mock::{MockCall, MockChain};
    use crate::notification::{EventRecord, TxPhase, EXTRINSIC_SUCCESS};

    const ALICE: &str = "alice";

    fn fund(who: &str, amount: u128) -> MockCall {
        MockCall::Fund {
            who: who.to_string(),
            amount,
        }
    }

    #[test]
    fn counter_hands_out_consecutive_nonces() {
        let mut counter = SequenceCounter::new(41);
        assert_eq!(counter.assign(), 41);
        assert_eq!(counter.assign(), 42);
        assert_eq!(counter.base(), 41);
        assert_eq!(counter.assigned(), 2);
    }

    #[tokio::test]
    async fn batch_assigns_consecutive_nonces_in_dispatch_order() {
        let chain = Arc::new(MockChain::new(ALICE, 17).with_latencies([60, 45, 30, 15, 0]));
        let submitter = BatchSubmitter::new(Arc::clone(&chain));

        let operations = (0..5u128).map(|i| Some(fund("bob", i + 1))).collect();
        let report = submitter
            .submit_batch(&ALICE.to_string(), operations)
            .await
            .unwrap();

        assert_eq!(report.base_nonce, 17);
        assert_eq!(report.nonces(), vec![17, 18, 19, 20, 21]);
        assert_eq!(chain.accepted_nonces(), vec![17, 18, 19, 20, 21]);
        // confirmations raced back in reverse
        assert_eq!(chain.confirmed_nonces(), vec![21, 20, 19, 18, 17]);
        assert_eq!(report.failed(), 0);
        assert_eq!(chain.unsubscribed(), 5);
    }

    #[tokio::test]
    async fn skipped_members_do_not_consume_nonces() {
        let chain = Arc::new(MockChain::new(ALICE, 3));
        let submitter = BatchSubmitter::new(Arc::clone(&chain));

        let balances = [1000u128, 0, 5];
        let operations = balances
            .iter()
            .map(|balance| (*balance != 0).then(|| fund("bob", *balance)))
            .collect();
        let report = submitter
            .submit_batch(&ALICE.to_string(), operations)
            .await
            .unwrap();

        assert_eq!(report.nonces(), vec![3, 4]);
        assert!(matches!(report.members[1], MemberOutcome::Skipped));
        assert_eq!(chain.accepted_nonces().len(), 2);
        assert_eq!(chain.nonce_of(ALICE), 5);
        report.into_result().unwrap();
    }

    #[tokio::test]
    async fn batch_reports_every_member_and_fails_as_a_whole() {
        let chain = Arc::new(MockChain::new(ALICE, 0));
        let submitter = BatchSubmitter::new(Arc::clone(&chain));

        let operations = vec![
            Some(fund("bob", 1)),
            Some(MockCall::Burn {
                collection: 1,
                token: 1,
                amount: 5,
            }),
            Some(fund("eve", 1)),
        ];
        let report = submitter
            .submit_batch(&ALICE.to_string(), operations)
            .await
            .unwrap();

        assert!(report.members[0].notification().is_some());
        assert!(matches!(
            &report.members[1],
            MemberOutcome::Failed { nonce: 1, failure } if failure.is_module("common", "TokenValueTooLow")
        ));
        assert!(report.members[2].notification().is_some());

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, Error::BatchFailed { failed: 1, total: 3 }));
    }

    #[tokio::test]
    async fn rejected_submission_halts_further_dispatch() {
        let chain = Arc::new(MockChain::new(ALICE, 0));
        // a future transaction already sits at nonce 1
        chain.park(ALICE, 1);
        let submitter = BatchSubmitter::new(Arc::clone(&chain));

        let operations = vec![
            Some(fund("bob", 1)),
            Some(fund("bob", 2)),
            Some(fund("bob", 3)),
        ];
        let report = submitter
            .submit_batch(&ALICE.to_string(), operations)
            .await
            .unwrap();

        assert!(report.members[0].notification().is_some());
        assert!(matches!(
            &report.members[1],
            MemberOutcome::Aborted {
                nonce: 1,
                error: Error::Provider { .. }
            }
        ));
        assert!(matches!(report.members[2], MemberOutcome::NotDispatched));
        assert_eq!(report.nonces(), vec![0, 1]);
        assert_eq!(chain.accepted_nonces(), vec![0]);
        assert_eq!(report.failed(), 2);
    }

    #[tokio::test]
    async fn manual_nonces_one_apart_resolve_independently() {
        let chain = Arc::new(MockChain::new(ALICE, 9).with_latencies([30, 0]));
        let submitter = BatchSubmitter::new(Arc::clone(&chain));
        let signer = ALICE.to_string();

        let (first, second) = tokio::join!(
            submitter.submit_with_nonce(&signer, fund("bob", 1), 9),
            submitter.submit_with_nonce(&signer, fund("eve", 1), 10),
        );

        assert!(first.unwrap().has_event_method(EXTRINSIC_SUCCESS));
        assert!(second.unwrap().has_event_method(EXTRINSIC_SUCCESS));
        let mut accepted = chain.accepted_nonces();
        accepted.sort_unstable();
        assert_eq!(accepted, vec![9, 10]);
    }

    #[tokio::test]
    async fn provider_nonce_and_the_next_one_both_succeed_concurrently() {
        let chain = Arc::new(MockChain::new(ALICE, 4).with_latencies([20, 0]));
        let submitter = BatchSubmitter::new(Arc::clone(&chain));
        let signer = ALICE.to_string();

        let first = submitter
            .provider()
            .next_sequence_number(&signer)
            .await
            .unwrap();
        let (earlier, later) = tokio::join!(
            submitter.submit_with_nonce(&signer, fund("bob", 1), first),
            submitter.submit_with_nonce(&signer, fund("bob", 1), first + 1),
        );

        assert!(earlier.unwrap().has_event_method(EXTRINSIC_SUCCESS));
        assert!(later.unwrap().has_event_method(EXTRINSIC_SUCCESS));
        let mut accepted = chain.accepted_nonces();
        accepted.sort_unstable();
        assert_eq!(accepted, vec![4, 5]);
        assert_eq!(chain.nonce_of(ALICE), 6);
    }

    #[tokio::test]
    async fn duplicate_nonce_is_rejected_by_the_provider() {
        let chain = Arc::new(MockChain::new(ALICE, 0));
        let submitter = BatchSubmitter::new(Arc::clone(&chain));
        let signer = ALICE.to_string();

        submitter
            .submit_with_nonce(&signer, fund("bob", 1), 0)
            .await
            .unwrap();
        let err = submitter
            .submit_with_nonce(&signer, fund("bob", 1), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }

    #[tokio::test]
    async fn overburn_fails_and_exact_burn_succeeds() {
        let chain = Arc::new(MockChain::new(ALICE, 0));
        let submitter = BatchSubmitter::new(Arc::clone(&chain));
        let signer = ALICE.to_string();

        let minted = submitter
            .submit(
                &signer,
                MockCall::Mint {
                    collection: 4,
                    amount: 100,
                },
            )
            .await
            .unwrap();
        let created = find_event(&minted, "common.ItemCreated").unwrap();
        let collection = created[0].as_u128().unwrap();
        let token = created[1].as_u128().unwrap();

        let err = submitter
            .submit(
                &signer,
                MockCall::Burn {
                    collection,
                    token,
                    amount: 101,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::TransactionFailed { failure } if failure.is_module("common", "TokenValueTooLow")
        ));

        let burnt = submitter
            .submit(
                &signer,
                MockCall::Burn {
                    collection,
                    token,
                    amount: 100,
                },
            )
            .await
            .unwrap();
        let destroyed = find_event(&burnt, "common.ItemDestroyed").unwrap();
        assert_eq!(destroyed[1].as_u128(), Some(token));
        assert_eq!(destroyed[3].as_u128(), Some(100));
    }

    #[tokio::test]
    async fn marker_less_member_aborts_without_hanging_the_batch() {
        let chain = Arc::new(MockChain::new(ALICE, 0));
        let submitter = BatchSubmitter::new(Arc::clone(&chain));

        let operations = vec![
            Some(MockCall::Scripted(vec![
                Notification::new(TxPhase::Ready),
                Notification::new(TxPhase::Finalized)
                    .with_events(vec![EventRecord::new("balances", "Withdraw", vec![])]),
            ])),
            Some(fund("bob", 1)),
        ];
        let report = submitter
            .submit_batch(&ALICE.to_string(), operations)
            .await
            .unwrap();

        assert!(matches!(
            &report.members[0],
            MemberOutcome::Aborted {
                nonce: 0,
                error: Error::ProtocolInconsistency { .. }
            }
        ));
        assert!(report.members[1].notification().is_some());
        assert_eq!(report.failed(), 1);
    }
}
