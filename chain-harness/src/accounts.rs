//! Fresh, funded test accounts.
//!
//! Accounts are derived from the dev phrase under `//<seed><iteration><index>`, so every
//! call hands out accounts nobody has used before, and funded by the sudo key in one
//! nonce-sequenced batch.

use std::str::FromStr;

use log::info;
use snafu::{OptionExt, ResultExt};
use subxt::utils::AccountId32;
use subxt_signer::sr25519::{dev, Keypair};
use subxt_signer::SecretUri;
use tx_harness::BatchSubmitter;

use crate::calls::{force_set_balance, sudo};
use crate::error::{
    BalanceOverflowSnafu,
    DecimalsTooLargeSnafu,
    KeypairDerivationSnafu,
    Result,
    SecretUriSnafu,
};
use crate::provider::SubxtProvider;

/// The account id of a keypair.
pub fn account_id(keypair: &Keypair) -> AccountId32 {
    keypair.public_key().to_account_id()
}

/// Derivation uri of account `index` in batch `iteration`.
pub fn account_uri(seed: &str, iteration: u32, index: usize) -> String {
    format!("//{seed}{iteration}{index}")
}

/// Derives the keypair at `uri`.
pub fn derive_keypair(uri: &str) -> Result<Keypair> {
    let secret = SecretUri::from_str(uri).context(SecretUriSnafu { uri })?;
    Keypair::from_uri(&secret).context(KeypairDerivationSnafu { uri })
}

/// Derives `count` keypairs of batch `iteration`.
pub fn derive_batch(seed: &str, iteration: u32, count: usize) -> Result<Vec<Keypair>> {
    (0..count)
        .map(|index| derive_keypair(&account_uri(seed, iteration, index)))
        .collect()
}

/// One unit of a token with `decimals` decimal places.
pub fn nominal_unit(decimals: u32) -> Result<u128> {
    10u128
        .checked_pow(decimals)
        .context(DecimalsTooLargeSnafu { decimals })
}

/// Derives and funds test accounts from the sudo key.
pub struct AccountsManager {
    /// Submitter used for funding batches.
    submitter: BatchSubmitter<SubxtProvider>,
    /// Per-run seed keeping derived accounts unique across runs.
    seed: String,
    /// Number of derivation batches so far.
    iteration: u32,
    /// One whole token in the chain's smallest unit.
    nominal: u128,
    /// The sudo key.
    root: Keypair,
}

impl AccountsManager {
    /// Creates a manager funding from `//Alice`.
    pub fn new(
        submitter: BatchSubmitter<SubxtProvider>,
        seed: impl Into<String>,
        decimals: u32,
    ) -> Result<Self> {
        Ok(Self {
            submitter,
            seed: seed.into(),
            iteration: 0,
            nominal: nominal_unit(decimals)?,
            root: dev::alice(),
        })
    }

    /// The sudo key.
    pub fn root(&self) -> &Keypair {
        &self.root
    }

    /// One whole token in the chain's smallest unit.
    pub fn nominal(&self) -> u128 {
        self.nominal
    }

    /// Derives `count` fresh keypairs without funding them.
    pub fn derive(&mut self, count: usize) -> Result<Vec<Keypair>> {
        self.iteration += 1;
        derive_batch(&self.seed, self.iteration, count)
    }

    /// Derives one fresh account per entry of `balances` and funds each with that many
    /// whole tokens.
    ///
    /// Zero balances are skipped and consume no nonce.
    pub async fn derive_new_accounts(&mut self, balances: &[u128]) -> Result<Vec<Keypair>> {
        let accounts = self.derive(balances.len())?;

        let calls = balances
            .iter()
            .zip(&accounts)
            .map(|(&balance, account)| {
                if balance == 0 {
                    return Ok(None);
                }
                let amount = balance
                    .checked_mul(self.nominal)
                    .context(BalanceOverflowSnafu { balance })?;
                Ok(Some(sudo(force_set_balance(&account_id(account), amount))))
            })
            .collect::<Result<Vec<_>>>()?;

        self.submitter.submit_batch_ensure(&self.root, calls).await?;
        info!("💰 Funded {} derived accounts", balances.iter().filter(|b| **b != 0).count());

        Ok(accounts)
    }
}
