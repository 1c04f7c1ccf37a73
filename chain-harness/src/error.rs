use snafu::Snafu;

/// Errors raised while driving the harness against a live node.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Error when attempting to connect to a blockchain network.
    #[snafu(display("Error connecting to chain: {source}"))]
    ChainConnectionError {
        /// The underlying error from the `subxt` library.
        source: subxt::Error,
    },

    /// A derivation uri could not be parsed.
    #[snafu(display("Invalid secret uri '{uri}': {source}"))]
    SecretUri {
        /// The offending uri.
        uri: String,
        /// The underlying parse error.
        source: subxt_signer::SecretUriError,
    },

    /// A keypair could not be derived from a parsed uri.
    #[snafu(display("Failed to derive keypair from '{uri}': {source}"))]
    KeypairDerivation {
        /// The uri the keypair was derived from.
        uri: String,
        /// The underlying signer error.
        source: subxt_signer::sr25519::Error,
    },

    /// The token's decimal count does not fit a `u128` nominal unit.
    #[snafu(display("Token decimals {decimals} overflow the nominal unit"))]
    DecimalsTooLarge {
        /// Configured decimal count.
        decimals: u32,
    },

    /// A balance scaled by the nominal unit overflowed.
    #[snafu(display("Balance {balance} overflows once scaled to the nominal unit"))]
    BalanceOverflow {
        /// The unscaled balance.
        balance: u128,
    },

    /// A submission or watch inside the harness failed.
    #[snafu(display("{source}"))]
    Harness {
        /// The harness error.
        source: tx_harness::Error,
    },

    /// An event was found but lacked the expected field.
    #[snafu(display("Event {signature} has no integer field at position {index}"))]
    MissingEventField {
        /// `section.method` of the event.
        signature: String,
        /// Expected field position.
        index: usize,
    },

    /// A scenario step resolved differently than expected.
    #[snafu(display("Scenario step '{step}' resolved unexpectedly: {detail}"))]
    UnexpectedOutcome {
        /// The scenario step.
        step: String,
        /// What actually happened.
        detail: String,
    },
}

impl From<tx_harness::Error> for Error {
    fn from(source: tx_harness::Error) -> Self {
        Error::Harness { source }
    }
}

/// Type alias for results that return a `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
