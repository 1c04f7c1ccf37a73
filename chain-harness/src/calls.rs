//! Dynamic call builders for the pallets the harness drives.
//!
//! Calls are built against the node's metadata at submission time, so argument values
//! only need the right shape, not static types.

use subxt::dynamic::{self, Value};
use subxt::tx::DynamicPayload;
use subxt::utils::AccountId32;

use crate::collections::CollectionData;

/// Section (pallet) name of the whitelist pallet.
const WHITELIST: &str = "Whitelist";

/// Section (pallet) name of the refungible pallet.
const REFUNGIBLE: &str = "Refungible";

/// A `MultiAddress::Id` lookup source for `account`.
pub fn address(account: &AccountId32) -> Value {
    Value::unnamed_variant("Id", [Value::from_bytes(account.0)])
}

/// The whitelist key of an investor: the first 32 bytes of its SS58 address.
pub fn investor_key(account: &AccountId32) -> [u8; 32] {
    let address = account.to_string();
    let mut key = [0u8; 32];
    let bytes = address.as_bytes();
    let len = bytes.len().min(key.len());
    key[..len].copy_from_slice(&bytes[..len]);
    key
}

/// Wraps `call` in `Sudo.sudo`.
pub fn sudo(call: DynamicPayload) -> DynamicPayload {
    dynamic::tx("Sudo", "sudo", vec![call.into_value()])
}

/// `Balances.force_set_balance(who, new_free)`.
pub fn force_set_balance(who: &AccountId32, new_free: u128) -> DynamicPayload {
    dynamic::tx(
        "Balances",
        "force_set_balance",
        vec![address(who), Value::u128(new_free)],
    )
}

/// `Balances.transfer_keep_alive(dest, value)`.
pub fn transfer_keep_alive(dest: &AccountId32, value: u128) -> DynamicPayload {
    dynamic::tx(
        "Balances",
        "transfer_keep_alive",
        vec![address(dest), Value::u128(value)],
    )
}

/// `Whitelist.add_admin(new_admin)`.
pub fn add_admin(new_admin: &AccountId32) -> DynamicPayload {
    dynamic::tx(WHITELIST, "add_admin", vec![Value::from_bytes(new_admin.0)])
}

/// `Whitelist.add_manager(new_manager)`.
pub fn add_manager(new_manager: &AccountId32) -> DynamicPayload {
    dynamic::tx(WHITELIST, "add_manager", vec![Value::from_bytes(new_manager.0)])
}

/// `Whitelist.add_investors(new_investors)`, every investor active.
pub fn add_investors(investors: &[AccountId32]) -> DynamicPayload {
    let entries = investors.iter().map(|account| {
        Value::unnamed_composite([
            Value::from_bytes(investor_key(account)),
            Value::named_composite([
                ("account", Value::from_bytes(account.0)),
                ("is_active", Value::bool(true)),
            ]),
        ])
    });
    dynamic::tx(WHITELIST, "add_investors", vec![Value::unnamed_composite(entries)])
}

/// `Refungible.init_collection(data, flags)`.
pub fn init_collection(data: &CollectionData) -> DynamicPayload {
    dynamic::tx(
        REFUNGIBLE,
        "init_collection",
        vec![data.to_value(), data.flags_value()],
    )
}

/// `Refungible.create_item(collection_id, user_balances, token_properties)`.
pub fn create_item(
    collection_id: u128,
    balances: &[(AccountId32, u128)],
    properties: &[(String, String)],
) -> DynamicPayload {
    let balances = balances.iter().map(|(account, amount)| {
        Value::unnamed_composite([Value::from_bytes(account.0), Value::u128(*amount)])
    });
    dynamic::tx(
        REFUNGIBLE,
        "create_item",
        vec![
            Value::u128(collection_id),
            Value::unnamed_composite(balances),
            property_values(properties),
        ],
    )
}

/// `Refungible.burn(collection_id, token_id, amount)`.
pub fn burn(collection_id: u128, token_id: u128, amount: u128) -> DynamicPayload {
    dynamic::tx(
        REFUNGIBLE,
        "burn",
        vec![
            Value::u128(collection_id),
            Value::u128(token_id),
            Value::u128(amount),
        ],
    )
}

/// Key/value properties as a list of `{ key, value }` byte strings.
pub(crate) fn property_values(properties: &[(String, String)]) -> Value {
    Value::unnamed_composite(properties.iter().map(|(key, value)| {
        Value::named_composite([
            ("key", Value::from_bytes(key.as_bytes())),
            ("value", Value::from_bytes(value.as_bytes())),
        ])
    }))
}
