//! [`TxProvider`] over a `subxt` client.
//!
//! Every `TxStatus` from the node's watch subscription is mapped onto a harness
//! [`Notification`]. In-block statuses carry the extrinsic's events, fetched as they
//! arrive, and the decoded dispatch error of `System.ExtrinsicFailed` when present.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::abortable;
use futures::StreamExt;
use log::{debug, warn};
use snafu::ResultExt;
use subxt::config::polkadot::PolkadotExtrinsicParamsBuilder as Params;
use subxt::ext::scale_value::{Composite, Primitive, Value, ValueDef};
use subxt::tx::{DynamicPayload, TxInBlock, TxStatus};
use subxt::{OnlineClient, PolkadotConfig};
use subxt_signer::sr25519::Keypair;
use tx_harness::{
    DispatchError,
    ErrorMetadata,
    EventField,
    EventRecord,
    Notification,
    ProviderError,
    Subscription,
    TxPhase,
    TxProvider,
    Unsubscribe,
};
use url::Url;

use crate::error::{ChainConnectionSnafu, Result};
use crate::metadata::{section_name, MetadataErrors};

/// Pallet emitting the extrinsic outcome events.
const SYSTEM_PALLET: &str = "System";

/// Connection to a Substrate node through `subxt`.
#[derive(Clone)]
pub struct SubxtProvider {
    /// The node client.
    client: OnlineClient<PolkadotConfig>,
}

impl SubxtProvider {
    /// Connects to the node at `url`.
    pub async fn connect(url: &Url) -> Result<Self> {
        let client = OnlineClient::<PolkadotConfig>::from_insecure_url(url.as_str())
            .await
            .context(ChainConnectionSnafu)?;
        Ok(Self::new(client))
    }

    /// Wraps an existing client.
    pub fn new(client: OnlineClient<PolkadotConfig>) -> Self {
        Self { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &OnlineClient<PolkadotConfig> {
        &self.client
    }
}

/// Renders a `subxt` error as a transport error.
fn rpc_error(err: subxt::Error) -> ProviderError {
    ProviderError::Rpc {
        message: err.to_string(),
    }
}

#[async_trait]
impl TxProvider for SubxtProvider {
    type Signer = Keypair;
    type Call = DynamicPayload;

    async fn next_sequence_number(&self, signer: &Keypair) -> Result<u64, ProviderError> {
        self.client
            .tx()
            .account_nonce(&signer.public_key().to_account_id())
            .await
            .map_err(rpc_error)
    }

    async fn submit(
        &self,
        call: DynamicPayload,
        signer: &Keypair,
        nonce: Option<u64>,
    ) -> Result<Subscription, ProviderError> {
        let tx = self.client.tx();
        let progress = match nonce {
            Some(nonce) => {
                tx.sign_and_submit_then_watch(&call, signer, Params::new().nonce(nonce).build())
                    .await
            }
            None => tx.sign_and_submit_then_watch_default(&call, signer).await,
        }
        .map_err(|err| ProviderError::Rejected {
            message: err.to_string(),
        })?;

        let (progress, handle) = abortable(progress);
        let stream = progress.then(notification_from_status).boxed();

        Ok(Subscription::new(
            stream,
            Unsubscribe::new(move || handle.abort()),
        ))
    }

    fn error_metadata(&self) -> Arc<dyn ErrorMetadata> {
        Arc::new(MetadataErrors::new(self.client.metadata()))
    }
}

/// Maps one watch item onto a notification.
async fn notification_from_status(
    item: Result<TxStatus<PolkadotConfig, OnlineClient<PolkadotConfig>>, subxt::Error>,
) -> Result<Notification, ProviderError> {
    let notification = match item.map_err(rpc_error)? {
        TxStatus::Validated => Notification::new(TxPhase::Ready),
        TxStatus::Broadcasted { num_peers } => {
            debug!("📡 Transaction broadcasted to {num_peers} peers.");
            Notification::new(TxPhase::Broadcast)
        }
        TxStatus::NoLongerInBestBlock => {
            warn!("⚠️ Transaction is no longer in the best block.");
            Notification::new(TxPhase::Retracted)
        }
        TxStatus::InBestBlock(details) => included(TxPhase::InBlock, details).await?,
        TxStatus::InFinalizedBlock(details) => included(TxPhase::Finalized, details).await?,
        TxStatus::Invalid { message } => {
            warn!("⚠️ Transaction invalid: {message}");
            Notification::new(TxPhase::Invalid)
        }
        TxStatus::Dropped { message } => {
            warn!("⚠️ Transaction dropped: {message}");
            Notification::new(TxPhase::Dropped)
        }
        TxStatus::Error { message } => return Err(ProviderError::Rpc { message }),
    };
    Ok(notification)
}

/// Builds the notification of an included transaction from its block events.
async fn included(
    phase: TxPhase,
    details: TxInBlock<PolkadotConfig, OnlineClient<PolkadotConfig>>,
) -> Result<Notification, ProviderError> {
    let block_hash = format!("{:?}", details.block_hash());
    let events = details.fetch_events().await.map_err(rpc_error)?;

    let mut records = Vec::new();
    let mut dispatch_error = None;
    for event in events.iter() {
        let event = event.map_err(rpc_error)?;
        let fields = event.field_values().map_err(|e| rpc_error(e.into()))?;

        if event.pallet_name() == SYSTEM_PALLET
            && event.variant_name() == tx_harness::notification::EXTRINSIC_FAILED
        {
            dispatch_error = fields.values().next().map(dispatch_error_from_value);
        }

        records.push(EventRecord::new(
            section_name(event.pallet_name()),
            event.variant_name(),
            fields.values().map(field_from_value).collect(),
        ));
    }

    let notification = Notification::new(phase)
        .with_events(records)
        .with_block_hash(block_hash);
    Ok(match dispatch_error {
        Some(error) => notification.with_dispatch_error(error),
        None => notification,
    })
}

/// Decodes the `dispatch_error` field of `System.ExtrinsicFailed`.
fn dispatch_error_from_value<T>(value: &Value<T>) -> DispatchError {
    let ValueDef::Variant(variant) = &value.value else {
        return DispatchError::Other {
            kind: value.to_string(),
        };
    };
    if variant.name != "Module" {
        return DispatchError::Other {
            kind: variant.name.clone(),
        };
    }

    // Module(ModuleError { index: u8, error: [u8; 4] })
    let module = variant.values.values().next();
    let index = module
        .and_then(|module| named_field(module, "index"))
        .and_then(Value::as_u128)
        .and_then(|index| u8::try_from(index).ok());
    let error = module
        .and_then(|module| named_field(module, "error"))
        .and_then(byte_vec)
        .and_then(|bytes| bytes.first().copied());

    match (index, error) {
        (Some(index), Some(error)) => DispatchError::Module { index, error },
        _ => DispatchError::Other {
            kind: value.to_string(),
        },
    }
}

/// Looks up a field of a named composite.
fn named_field<'a, T>(value: &'a Value<T>, name: &str) -> Option<&'a Value<T>> {
    match &value.value {
        ValueDef::Composite(Composite::Named(fields)) => fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value),
        _ => None,
    }
}

/// Collects a composite made only of byte-sized integers.
fn byte_vec<T>(value: &Value<T>) -> Option<Vec<u8>> {
    let ValueDef::Composite(composite) = &value.value else {
        return None;
    };
    composite
        .values()
        .map(|item| item.as_u128().and_then(|byte| u8::try_from(byte).ok()))
        .collect()
}

/// Converts a decoded event field into an [`EventField`].
///
/// Newtype wrappers such as `CollectionId(u32)` are unwrapped to their inner value, byte
/// arrays of length 32 become accounts and other multi-byte lists become raw bytes.
fn field_from_value<T>(value: &Value<T>) -> EventField {
    match &value.value {
        ValueDef::Primitive(Primitive::U128(number)) => EventField::U128(*number),
        ValueDef::Primitive(Primitive::I128(number)) => EventField::I128(*number),
        ValueDef::Primitive(Primitive::Bool(flag)) => EventField::Bool(*flag),
        ValueDef::Primitive(Primitive::String(text)) => EventField::Text(text.clone()),
        ValueDef::Primitive(Primitive::Char(c)) => EventField::Text(c.to_string()),
        ValueDef::Composite(composite) if composite.len() == 1 => match composite.values().next() {
            Some(inner) => field_from_value(inner),
            None => bytes_field(value),
        },
        ValueDef::Composite(_) => bytes_field(value),
        _ => EventField::Other(value.to_string()),
    }
}

/// Byte lists as accounts or raw bytes; anything else rendered as text.
fn bytes_field<T>(value: &Value<T>) -> EventField {
    match byte_vec(value) {
        Some(bytes) => match <[u8; 32]>::try_from(bytes.as_slice()) {
            Ok(account) => EventField::Account(account),
            Err(_) => EventField::Bytes(bytes),
        },
        None => EventField::Other(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{event_id, COLLECTION_CREATED, ITEM_CREATED};

    fn module_error(index: u8, error: u8) -> Value {
        Value::unnamed_variant(
            "Module",
            [Value::named_composite([
                ("index", Value::u128(index.into())),
                ("error", Value::from_bytes([error, 0, 0, 0])),
            ])],
        )
    }

    #[test]
    fn module_dispatch_errors_keep_their_indices() {
        assert_eq!(
            dispatch_error_from_value(&module_error(7, 3)),
            DispatchError::Module { index: 7, error: 3 }
        );
    }

    #[test]
    fn other_dispatch_errors_keep_their_kind() {
        let value = Value::unnamed_variant("BadOrigin", []);
        assert_eq!(
            dispatch_error_from_value(&value),
            DispatchError::Other {
                kind: "BadOrigin".to_string()
            }
        );
    }

    #[test]
    fn integers_and_flags_convert_directly() {
        assert_eq!(field_from_value(&Value::u128(42)), EventField::U128(42));
        assert_eq!(field_from_value(&Value::i128(-1)), EventField::I128(-1));
        assert_eq!(field_from_value(&Value::bool(true)), EventField::Bool(true));
        assert_eq!(
            field_from_value(&Value::string("STP")),
            EventField::Text("STP".to_string())
        );
    }

    #[test]
    fn accounts_are_unwrapped_from_newtypes() {
        let account = Value::unnamed_composite([Value::from_bytes([9u8; 32])]);
        assert_eq!(field_from_value(&account), EventField::Account([9; 32]));

        let bytes = Value::from_bytes([1u8, 2, 3]);
        assert_eq!(field_from_value(&bytes), EventField::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn small_id_newtypes_stay_integers() {
        let collection_id = Value::unnamed_composite([Value::u128(1)]);
        assert_eq!(field_from_value(&collection_id), EventField::U128(1));

        let token_id = Value::named_composite([("0", Value::u128(255))]);
        assert_eq!(field_from_value(&token_id), EventField::U128(255));
    }

    #[test]
    fn created_ids_are_readable_by_position() {
        let data = [
            Value::unnamed_composite([Value::u128(1)]),
            Value::unnamed_composite([Value::u128(2)]),
            Value::unnamed_composite([Value::from_bytes([4u8; 32])]),
            Value::u128(100),
        ];
        let notification = Notification::new(TxPhase::InBlock).with_events(vec![
            EventRecord::new(
                "common",
                "CollectionCreated",
                vec![field_from_value(&data[0]), field_from_value(&data[2])],
            ),
            EventRecord::new("common", "ItemCreated", data.iter().map(field_from_value).collect()),
        ]);

        assert_eq!(event_id(&notification, COLLECTION_CREATED, 0).unwrap(), 1);
        assert_eq!(event_id(&notification, ITEM_CREATED, 1).unwrap(), 2);
    }

    #[test]
    fn unknown_shapes_fall_back_to_text() {
        let value = Value::unnamed_variant("Some", [Value::u128(1)]);
        assert!(matches!(field_from_value(&value), EventField::Other(_)));
    }
}
