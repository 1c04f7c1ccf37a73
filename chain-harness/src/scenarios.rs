//! End-to-end scenarios run against a live node.

use log::info;
use subxt_signer::sr25519::Keypair;
use tx_harness::{
    find_event,
    BatchSubmitter,
    Error as HarnessError,
    EventField,
    Notification,
    TxProvider,
};

use crate::accounts::{account_id, AccountsManager};
use crate::calls::{burn, transfer_keep_alive};
use crate::collections::{CollectionData, CollectionMode};
use crate::error::{Error, Result};
use crate::provider::SubxtProvider;
use crate::state::StateInitializer;

/// Event announcing burnt pieces; field 3 is the amount.
pub const ITEM_DESTROYED: &str = "common.ItemDestroyed";

/// Section of the error expected from an overburn.
const OVERBURN_SECTION: &str = "common";

/// Name of the error expected from an overburn.
const OVERBURN_ERROR: &str = "TokenValueTooLow";

/// Pieces minted to the holder.
const MINTED: u128 = 100;

/// What the burn scenario observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnReport {
    /// Collection the token lives in.
    pub collection: u128,
    /// Burnt token.
    pub token: u128,
    /// Error reported for the overburn.
    pub overburn_error: String,
    /// `common.ItemDestroyed` fields of the exact burn.
    pub destroyed: Vec<EventField>,
}

/// Checks that an overburn is refused with the expected module error.
fn expect_overburn_rejected(result: tx_harness::Result<Notification>) -> Result<String> {
    match result {
        Err(HarnessError::TransactionFailed { failure })
            if failure.is_module(OVERBURN_SECTION, OVERBURN_ERROR) =>
        {
            Ok(failure.to_string())
        }
        Err(err) => Err(Error::UnexpectedOutcome {
            step: "overburn".to_string(),
            detail: err.to_string(),
        }),
        Ok(_) => Err(Error::UnexpectedOutcome {
            step: "overburn".to_string(),
            detail: "the burn succeeded".to_string(),
        }),
    }
}

/// Mints a token and then tries to burn more than, and exactly, its balance.
///
/// The overburn must fail with `common.TokenValueTooLow`; the exact burn must succeed
/// and emit `common.ItemDestroyed`.
pub async fn burn_scenario(
    accounts: &mut AccountsManager,
    state: &StateInitializer,
    submitter: &BatchSubmitter<SubxtProvider>,
) -> Result<BurnReport> {
    let holder: Keypair = accounts
        .derive_new_accounts(&[1000])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::UnexpectedOutcome {
            step: "derive".to_string(),
            detail: "no account derived".to_string(),
        })?;
    let holder_id = account_id(&holder);

    state
        .set_whitelist_admins(std::slice::from_ref(&holder_id), accounts.root())
        .await?;
    let collection = state
        .create_collection(&holder, &CollectionData::new(CollectionMode::ReFungible))
        .await?;
    let token = state
        .create_item(&holder, collection, &[(holder_id, MINTED)], &[])
        .await?;

    let overburn_error = expect_overburn_rejected(
        submitter
            .submit(&holder, burn(collection, token, MINTED + 1))
            .await,
    )?;
    info!("🔥 Overburn refused with {overburn_error}");

    let burnt = submitter
        .submit(&holder, burn(collection, token, MINTED))
        .await?;
    let destroyed = find_event(&burnt, ITEM_DESTROYED)?.to_vec();
    info!("🔥 Burnt {MINTED} pieces of token {token} in collection {collection}");

    Ok(BurnReport {
        collection,
        token,
        overburn_error,
        destroyed,
    })
}

/// What the manual nonce scenario observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceReport {
    /// The two nonces used, `k` and `k + 1`.
    pub nonces: [u64; 2],
    /// Including block of each transaction.
    pub block_hashes: [Option<String>; 2],
}

/// Sends two transfers from one signer with hand-assigned nonces `k` and `k + 1` at
/// once; both must resolve independently without a nonce collision.
pub async fn nonce_scenario(
    accounts: &mut AccountsManager,
    submitter: &BatchSubmitter<SubxtProvider>,
) -> Result<NonceReport> {
    let sender = accounts
        .derive_new_accounts(&[1000])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::UnexpectedOutcome {
            step: "derive".to_string(),
            detail: "no account derived".to_string(),
        })?;
    let dest = account_id(accounts.root());
    let amount = accounts.nominal();

    let first = submitter
        .provider()
        .next_sequence_number(&sender)
        .await
        .map_err(|source| HarnessError::Provider { source })?;
    let second = first + 1;

    let (earlier, later) = tokio::join!(
        submitter.submit_with_nonce(&sender, transfer_keep_alive(&dest, amount), first),
        submitter.submit_with_nonce(&sender, transfer_keep_alive(&dest, amount), second),
    );
    let earlier = earlier?;
    let later = later?;
    info!("🔢 Transfers with nonces {first} and {second} both succeeded");

    Ok(NonceReport {
        nonces: [first, second],
        block_hashes: [earlier.block_hash, later.block_hash],
    })
}
