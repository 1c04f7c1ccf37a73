//! In-memory chain used by the unit tests.
//!
//! `MockChain` keeps per-account nonces, a transaction pool keyed by
//! `(account, nonce)` and a small token ledger. Every accepted submission gets its own
//! channel fed by a spawned task, so confirmations of different submissions race each
//! other the way they do against a real node.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::extractor::{ErrorMetadata, ErrorTable};
use crate::notification::{
    DispatchError,
    EventField,
    EventRecord,
    Notification,
    TxPhase,
    EXTRINSIC_FAILED,
    EXTRINSIC_SUCCESS,
};
use crate::provider::{Subscription, TxProvider, Unsubscribe};

/// Module index of the `common` section in the mock runtime.
pub const COMMON_INDEX: u8 = 7;

/// Error index of `common.TokenValueTooLow`.
pub const TOKEN_VALUE_TOO_LOW: u8 = 3;

/// Calls understood by the mock runtime.
#[derive(Debug, Clone)]
pub enum MockCall {
    /// Sets the free balance of `who`.
    Fund {
        /// Funded account.
        who: String,
        /// New balance.
        amount: u128,
    },
    /// Mints `amount` pieces of a new token in `collection` to the signer.
    Mint {
        /// Collection of the new token.
        collection: u128,
        /// Pieces minted.
        amount: u128,
    },
    /// Burns `amount` pieces of a token held by the signer.
    Burn {
        /// Collection of the token.
        collection: u128,
        /// Token id.
        token: u128,
        /// Pieces burnt.
        amount: u128,
    },
    /// Delivers exactly these notifications.
    Scripted(Vec<Notification>),
}

/// Mutable chain state.
#[derive(Debug, Default)]
struct ChainState {
    /// Next nonce per account, pool included.
    nonces: HashMap<String, u64>,
    /// Pool entries, used to detect nonce collisions.
    pool: HashSet<(String, u64)>,
    /// Token pieces per `(collection, token, owner)`.
    pieces: HashMap<(u128, u128, String), u128>,
    /// Last minted token id.
    last_token: u128,
    /// Submissions in acceptance order.
    accepted: Vec<(String, u64)>,
    /// Nonces in the order their terminal notification was sent.
    confirmed: Vec<u64>,
}

/// Simulated chain implementing [`TxProvider`].
pub struct MockChain {
    /// Chain state.
    state: Arc<Mutex<ChainState>>,
    /// Confirmation latencies handed out to submissions in acceptance order.
    latencies: Mutex<VecDeque<Duration>>,
    /// Number of unsubscribe calls across all submissions.
    unsubscribed: Arc<AtomicUsize>,
}

impl MockChain {
    /// Creates a chain where `account` starts at nonce `nonce`.
    pub fn new(account: &str, nonce: u64) -> Self {
        let mut state = ChainState::default();
        state.nonces.insert(account.to_string(), nonce);
        Self {
            state: Arc::new(Mutex::new(state)),
            latencies: Mutex::new(VecDeque::new()),
            unsubscribed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Confirmation latencies for the next submissions, in acceptance order.
    pub fn with_latencies(self, latencies: impl IntoIterator<Item = u64>) -> Self {
        self.latencies
            .lock()
            .unwrap()
            .extend(latencies.into_iter().map(Duration::from_millis));
        self
    }

    /// Parks a future transaction of `account` in the pool without moving its nonce.
    pub fn park(&self, account: &str, nonce: u64) {
        self.state
            .lock()
            .unwrap()
            .pool
            .insert((account.to_string(), nonce));
    }

    /// Nonces of accepted submissions, in acceptance order.
    pub fn accepted_nonces(&self) -> Vec<u64> {
        let state = self.state.lock().unwrap();
        state.accepted.iter().map(|(_, nonce)| *nonce).collect()
    }

    /// Nonces in the order their terminal notification went out.
    pub fn confirmed_nonces(&self) -> Vec<u64> {
        self.state.lock().unwrap().confirmed.clone()
    }

    /// Next nonce of `account`.
    pub fn nonce_of(&self, account: &str) -> u64 {
        self.state
            .lock()
            .unwrap()
            .nonces
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    /// Number of unsubscribe calls so far.
    pub fn unsubscribed(&self) -> usize {
        self.unsubscribed.load(Ordering::SeqCst)
    }

    /// Executes a call and returns the notifications the node would report.
    fn execute(state: &mut ChainState, signer: &str, call: MockCall) -> Vec<Notification> {
        let mut events = Vec::new();
        let mut dispatch_error = None;

        match call {
            MockCall::Scripted(notifications) => return notifications,
            MockCall::Fund { who, amount } => {
                events.push(EventRecord::new(
                    "balances",
                    "BalanceSet",
                    vec![EventField::Text(who), EventField::U128(amount)],
                ));
            }
            MockCall::Mint { collection, amount } => {
                state.last_token += 1;
                let token = state.last_token;
                state
                    .pieces
                    .insert((collection, token, signer.to_string()), amount);
                events.push(EventRecord::new(
                    "common",
                    "ItemCreated",
                    vec![
                        EventField::U128(collection),
                        EventField::U128(token),
                        EventField::Text(signer.to_string()),
                        EventField::U128(amount),
                    ],
                ));
            }
            MockCall::Burn {
                collection,
                token,
                amount,
            } => {
                let key = (collection, token, signer.to_string());
                let held = state.pieces.get(&key).copied().unwrap_or_default();
                if amount == 0 || amount > held {
                    dispatch_error = Some(DispatchError::Module {
                        index: COMMON_INDEX,
                        error: TOKEN_VALUE_TOO_LOW,
                    });
                } else {
                    state.pieces.insert(key, held - amount);
                    events.push(EventRecord::new(
                        "common",
                        "ItemDestroyed",
                        vec![
                            EventField::U128(collection),
                            EventField::U128(token),
                            EventField::Text(signer.to_string()),
                            EventField::U128(amount),
                        ],
                    ));
                }
            }
        }

        let in_block = match dispatch_error {
            Some(error) => Notification::new(TxPhase::InBlock)
                .with_events(vec![EventRecord::new("system", EXTRINSIC_FAILED, vec![])])
                .with_dispatch_error(error),
            None => {
                events.push(EventRecord::new("system", EXTRINSIC_SUCCESS, vec![]));
                Notification::new(TxPhase::InBlock).with_events(events)
            }
        };

        vec![
            Notification::new(TxPhase::Ready),
            Notification::new(TxPhase::Broadcast),
            in_block.with_block_hash("0xb10c"),
        ]
    }
}

#[async_trait]
impl TxProvider for MockChain {
    type Signer = String;
    type Call = MockCall;

    async fn next_sequence_number(&self, signer: &String) -> Result<u64, ProviderError> {
        Ok(self.nonce_of(signer))
    }

    async fn submit(
        &self,
        call: MockCall,
        signer: &String,
        nonce: Option<u64>,
    ) -> Result<Subscription, ProviderError> {
        let notifications = {
            let mut state = self.state.lock().unwrap();
            let next = state.nonces.get(signer).copied().unwrap_or_default();
            let nonce = nonce.unwrap_or(next);

            if nonce < next && !state.pool.contains(&(signer.clone(), nonce)) {
                return Err(ProviderError::Rejected {
                    message: "Transaction is outdated".to_string(),
                });
            }
            if !state.pool.insert((signer.clone(), nonce)) {
                return Err(ProviderError::Rejected {
                    message: "Priority is too low".to_string(),
                });
            }
            state.nonces.insert(signer.clone(), next.max(nonce + 1));
            state.accepted.push((signer.clone(), nonce));

            Self::execute(&mut state, signer, call)
                .into_iter()
                .map(|notification| (nonce, notification))
                .collect::<Vec<_>>()
        };

        let latency = self
            .latencies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        let (sender, receiver) = mpsc::unbounded_channel();
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let last = notifications.len().saturating_sub(1);
            for (position, (nonce, notification)) in notifications.into_iter().enumerate() {
                if position == last {
                    tokio::time::sleep(latency).await;
                    state.lock().unwrap().confirmed.push(nonce);
                }
                if sender.send(Ok(notification)).is_err() {
                    return;
                }
            }
        });

        let unsubscribed = Arc::clone(&self.unsubscribed);
        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|item| (item, receiver))
        })
        .boxed();

        Ok(Subscription::new(
            stream,
            Unsubscribe::new(move || {
                unsubscribed.fetch_add(1, Ordering::SeqCst);
            }),
        ))
    }

    fn error_metadata(&self) -> Arc<dyn ErrorMetadata> {
        Arc::new(ErrorTable::new().with_error(
            COMMON_INDEX,
            TOKEN_VALUE_TOO_LOW,
            "common",
            "TokenValueTooLow",
        ))
    }
}
