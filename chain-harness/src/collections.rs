//! Collection creation data with the defaults the harness uses.

use subxt::dynamic::Value;

use crate::calls::property_values;

/// Default collection name.
pub const DEFAULT_NAME: &str = "CollectionName";

/// Default collection description.
pub const DEFAULT_DESCRIPTION: &str = "CollectionDescription";

/// Default token prefix.
pub const DEFAULT_TOKEN_PREFIX: &str = "STP";

/// Token model of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    /// Non fungible tokens.
    Nft,
    /// Fungible tokens with the given decimal points.
    Fungible(u8),
    /// Refungible tokens.
    ReFungible,
}

impl CollectionMode {
    /// Encodes the mode as the runtime enum variant.
    fn to_value(self) -> Value {
        match self {
            CollectionMode::Nft => Value::unnamed_variant("NFT", []),
            CollectionMode::Fungible(decimals) => {
                Value::unnamed_variant("Fungible", [Value::u128(decimals.into())])
            }
            CollectionMode::ReFungible => Value::unnamed_variant("ReFungible", []),
        }
    }
}

/// Parameters of a new collection. Unset text fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionData {
    /// Token model.
    pub mode: CollectionMode,
    /// Collection name.
    pub name: Option<String>,
    /// Collection description.
    pub description: Option<String>,
    /// Token prefix.
    pub token_prefix: Option<String>,
    /// Property keys that stay mutable after creation.
    pub mutable_properties: Vec<String>,
    /// Initial collection properties.
    pub properties: Vec<(String, String)>,
    /// Raw collection flags byte.
    pub flags: u8,
}

impl CollectionData {
    /// Data for a collection of `mode` with every other field defaulted.
    pub fn new(mode: CollectionMode) -> Self {
        Self {
            mode,
            name: None,
            description: None,
            token_prefix: None,
            mutable_properties: Vec::new(),
            properties: Vec::new(),
            flags: 0,
        }
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the token prefix.
    pub fn with_token_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.token_prefix = Some(prefix.into());
        self
    }

    /// Marks a property key as mutable.
    pub fn with_mutable_property(mut self, key: impl Into<String>) -> Self {
        self.mutable_properties.push(key.into());
        self
    }

    /// Adds an initial collection property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Name after defaults.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_NAME)
    }

    /// Description after defaults.
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or(DEFAULT_DESCRIPTION)
    }

    /// Token prefix after defaults.
    pub fn token_prefix(&self) -> &str {
        self.token_prefix.as_deref().unwrap_or(DEFAULT_TOKEN_PREFIX)
    }

    /// Encodes the data as the runtime's `CreateCollectionData`.
    pub fn to_value(&self) -> Value {
        let permissions = self.mutable_properties.iter().map(|key| {
            Value::named_composite([
                ("key", Value::from_bytes(key.as_bytes())),
                (
                    "permission",
                    Value::named_composite([("mutable", Value::bool(true))]),
                ),
            ])
        });

        Value::named_composite([
            ("mode", self.mode.to_value()),
            ("name", utf16_units(self.name())),
            ("description", utf16_units(self.description())),
            ("token_prefix", Value::from_bytes(self.token_prefix().as_bytes())),
            ("pending_sponsor", Value::unnamed_variant("None", [])),
            ("limits", Value::unnamed_variant("None", [])),
            ("property_permissions", Value::unnamed_composite(permissions)),
            ("properties", property_values(&self.properties)),
        ])
    }

    /// Encodes the flags as a single-byte composite.
    pub fn flags_value(&self) -> Value {
        Value::from_bytes([self.flags])
    }
}

/// Text as a list of UTF-16 code units.
fn utf16_units(text: &str) -> Value {
    Value::unnamed_composite(text.encode_utf16().map(|unit| Value::u128(unit.into())))
}
