//! Module error names resolved from live chain metadata.

use subxt::Metadata;
use tx_harness::{ErrorMetadata, ModuleErrorName};

/// Turns a runtime pallet name into an event/error section name (`TransactionPayment`
/// becomes `transactionPayment`).
pub fn section_name(pallet: &str) -> String {
    let mut chars = pallet.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// [`ErrorMetadata`] backed by a snapshot of the node's metadata.
#[derive(Debug, Clone)]
pub struct MetadataErrors {
    /// Metadata the errors are looked up in.
    metadata: Metadata,
}

impl MetadataErrors {
    /// Wraps a metadata snapshot.
    pub fn new(metadata: Metadata) -> Self {
        Self { metadata }
    }
}

impl ErrorMetadata for MetadataErrors {
    fn resolve_module_error(&self, module_index: u8, error_index: u8) -> Option<ModuleErrorName> {
        let pallet = self.metadata.pallet_by_index(module_index)?;
        let variant = pallet.error_variant_by_index(error_index)?;
        Some(ModuleErrorName::new(
            section_name(pallet.name()),
            variant.name.clone(),
        ))
    }
}
