//! Event lookup and module error decoding for terminal notifications.
//!
//! Callers pull identifiers created by a transaction out of its events by position,
//! e.g. the first field of `common.CollectionCreated` is the new collection id and the
//! second field of `common.ItemCreated` is the new token id. [`find_event`] therefore
//! hands back the raw positional field list untouched.

use std::collections::HashMap;

use snafu::Snafu;

use crate::error::{EventNotFoundSnafu, InvalidEventSignatureSnafu, Result};
use crate::notification::{DispatchError, EventField, ModuleErrorName, Notification, TxFailure};

/// Resolves module-indexed errors to human readable names.
///
/// Implemented over live chain metadata by node adapters and by [`ErrorTable`] for
/// offline use.
pub trait ErrorMetadata: Send + Sync {
    /// Looks up the `(section, name)` pair of a module error.
    fn resolve_module_error(&self, module_index: u8, error_index: u8) -> Option<ModuleErrorName>;
}

/// A fixed in-memory table of module errors.
#[derive(Debug, Clone, Default)]
pub struct ErrorTable {
    /// Known errors keyed by `(module index, error index)`.
    entries: HashMap<(u8, u8), ModuleErrorName>,
}

impl ErrorTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an error and returns the table.
    pub fn with_error(
        mut self,
        module_index: u8,
        error_index: u8,
        section: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.insert(module_index, error_index, ModuleErrorName::new(section, name));
        self
    }

    /// Registers an error.
    pub fn insert(&mut self, module_index: u8, error_index: u8, name: ModuleErrorName) {
        self.entries.insert((module_index, error_index), name);
    }
}

impl ErrorMetadata for ErrorTable {
    fn resolve_module_error(&self, module_index: u8, error_index: u8) -> Option<ModuleErrorName> {
        self.entries.get(&(module_index, error_index)).cloned()
    }
}

/// Reasons a dispatch error could not be decoded into a module error.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum Unrecoverable {
    /// The notification carries no dispatch error at all.
    #[snafu(display("no dispatch error present"))]
    NoDispatchError,

    /// The dispatch error is not a module error.
    #[snafu(display("non-module dispatch error: {kind}"))]
    NotModule {
        /// The dispatch error kind.
        kind: String,
    },

    /// The metadata has no entry for the module error.
    #[snafu(display("unknown module error {index}:{error}"))]
    UnknownModuleError {
        /// Module index.
        index: u8,
        /// Error index.
        error: u8,
    },
}

/// Splits a `section.method` signature into its parts.
fn parse_event_signature(signature: &str) -> Result<(&str, &str)> {
    let mut parts = signature.trim().split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(section), Some(method), None) if !section.is_empty() && !method.is_empty() => {
            Ok((section, method))
        }
        _ => InvalidEventSignatureSnafu { signature }.fail(),
    }
}

/// Returns the fields of the first event matching `section.method`, in emission order.
pub fn find_event<'a>(notification: &'a Notification, signature: &str) -> Result<&'a [EventField]> {
    let (section, method) = parse_event_signature(signature)?;

    notification
        .events
        .iter()
        .find(|event| event.is(section, method))
        .map(|event| event.data.as_slice())
        .ok_or_else(|| {
            EventNotFoundSnafu {
                signature: signature.trim(),
            }
            .build()
        })
}

/// Resolves a module dispatch error to its `(section, name)` pair.
pub fn decode_module_error(
    notification: &Notification,
    metadata: &dyn ErrorMetadata,
) -> Result<ModuleErrorName, Unrecoverable> {
    match &notification.dispatch_error {
        None => NoDispatchSnafu.fail(),
        Some(DispatchError::Other { kind }) => NotModuleSnafu { kind }.fail(),
        Some(DispatchError::Module { index, error }) => metadata
            .resolve_module_error(*index, *error)
            .ok_or(Unrecoverable::UnknownModuleError {
                index: *index,
                error: *error,
            }),
    }
}

/// Turns a failed notification into a [`TxFailure`], falling back to an opaque error
/// when the dispatch error cannot be decoded.
pub fn parse_failure(notification: &Notification, metadata: &dyn ErrorMetadata) -> TxFailure {
    match decode_module_error(notification, metadata) {
        Ok(name) => TxFailure::Module(name),
        Err(reason) => TxFailure::Unexpected {
            message: format!("status = {}, {reason}", notification.phase),
        },
    }
}
