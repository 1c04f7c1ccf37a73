//! Whitelist, collection and token setup used as preconditions by scenarios.

use log::info;
use snafu::OptionExt;
use subxt::utils::AccountId32;
use subxt_signer::sr25519::Keypair;
use tx_harness::{find_event, BatchSubmitter, Notification};

use crate::calls::{add_admin, add_investors, add_manager, create_item, init_collection};
use crate::collections::CollectionData;
use crate::error::{MissingEventFieldSnafu, Result};
use crate::provider::SubxtProvider;

/// Event announcing a new collection; field 0 is its id.
pub const COLLECTION_CREATED: &str = "common.CollectionCreated";

/// Event announcing a new token; field 1 is its id.
pub const ITEM_CREATED: &str = "common.ItemCreated";

/// Reads integer field `index` of the first `signature` event.
pub fn event_id(notification: &Notification, signature: &str, index: usize) -> Result<u128> {
    find_event(notification, signature)?
        .get(index)
        .and_then(|field| field.as_u128())
        .context(MissingEventFieldSnafu { signature, index })
}

/// Sets up on-chain state through ordinary signed transactions.
pub struct StateInitializer {
    /// Submitter shared with the scenario.
    submitter: BatchSubmitter<SubxtProvider>,
}

impl StateInitializer {
    /// Creates an initializer submitting through `submitter`.
    pub fn new(submitter: BatchSubmitter<SubxtProvider>) -> Self {
        Self { submitter }
    }

    /// Makes every account in `admins` a whitelist admin, one transaction each.
    pub async fn set_whitelist_admins(&self, admins: &[AccountId32], root: &Keypair) -> Result<()> {
        let calls = admins.iter().map(|admin| Some(add_admin(admin))).collect();
        self.submitter.submit_batch_ensure(root, calls).await?;
        info!("🛡️ Added {} whitelist admins", admins.len());
        Ok(())
    }

    /// Makes every account in `managers` a whitelist manager, one transaction each.
    pub async fn set_whitelist_managers(
        &self,
        managers: &[AccountId32],
        admin: &Keypair,
    ) -> Result<()> {
        let calls = managers
            .iter()
            .map(|manager| Some(add_manager(manager)))
            .collect();
        self.submitter.submit_batch_ensure(admin, calls).await?;
        info!("🛡️ Added {} whitelist managers", managers.len());
        Ok(())
    }

    /// Whitelists `investors` as active in a single transaction.
    pub async fn set_whitelist_investors(
        &self,
        investors: &[AccountId32],
        signer: &Keypair,
    ) -> Result<()> {
        self.submitter
            .submit(signer, add_investors(investors))
            .await?;
        info!("🛡️ Added {} whitelist investors", investors.len());
        Ok(())
    }

    /// Creates a collection owned by `owner` and returns its id.
    pub async fn create_collection(&self, owner: &Keypair, data: &CollectionData) -> Result<u128> {
        let notification = self.submitter.submit(owner, init_collection(data)).await?;
        let collection = event_id(&notification, COLLECTION_CREATED, 0)?;
        info!("📚 Created collection {collection}");
        Ok(collection)
    }

    /// Mints a token in `collection` split across `balances` and returns its id.
    pub async fn create_item(
        &self,
        owner: &Keypair,
        collection: u128,
        balances: &[(AccountId32, u128)],
        properties: &[(String, String)],
    ) -> Result<u128> {
        let notification = self
            .submitter
            .submit(owner, create_item(collection, balances, properties))
            .await?;
        let token = event_id(&notification, ITEM_CREATED, 1)?;
        info!("🪙 Created token {token} in collection {collection}");
        Ok(token)
    }
}
