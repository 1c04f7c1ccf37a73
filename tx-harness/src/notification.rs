//! Notifications describe one step of a submitted transaction's journey towards
//! inclusion and finality. They are produced by a [`crate::provider::TxProvider`] and
//! consumed immediately by a [`crate::controller::CompletionController`].

use std::fmt;

/// Method name of the system event emitted when an extrinsic executed successfully.
pub const EXTRINSIC_SUCCESS: &str = "ExtrinsicSuccess";

/// Method name of the system event emitted when an extrinsic trapped an error.
pub const EXTRINSIC_FAILED: &str = "ExtrinsicFailed";

/// Progress phase reported by the node for a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxPhase {
    /// Waiting in the pool for an earlier nonce.
    Future,
    /// Ready to be included.
    Ready,
    /// Gossiped to peers.
    Broadcast,
    /// Included in a block.
    InBlock,
    /// Included in a finalized block.
    Finalized,
    /// Rejected by the pool as invalid.
    Invalid,
    /// Dropped from the pool.
    Dropped,
    /// Replaced by another transaction with the same nonce.
    Usurped,
    /// The including block was retracted.
    Retracted,
}

impl TxPhase {
    /// Whether the transaction has been included in a block.
    pub fn is_included(self) -> bool {
        matches!(self, TxPhase::InBlock | TxPhase::Finalized)
    }

    /// Whether the pool has given up on the transaction.
    pub fn is_rejected(self) -> bool {
        matches!(
            self,
            TxPhase::Invalid | TxPhase::Dropped | TxPhase::Usurped | TxPhase::Retracted
        )
    }
}

impl fmt::Display for TxPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxPhase::Future => "Future",
            TxPhase::Ready => "Ready",
            TxPhase::Broadcast => "Broadcast",
            TxPhase::InBlock => "InBlock",
            TxPhase::Finalized => "Finalized",
            TxPhase::Invalid => "Invalid",
            TxPhase::Dropped => "Dropped",
            TxPhase::Usurped => "Usurped",
            TxPhase::Retracted => "Retracted",
        };
        f.write_str(name)
    }
}

/// One positional field of an event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventField {
    /// Unsigned integer (collection ids, token ids, balances, ...).
    U128(u128),
    /// Signed integer.
    I128(i128),
    /// Boolean flag.
    Bool(bool),
    /// Text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// A 32 byte account identifier.
    Account([u8; 32]),
    /// Any other value, rendered for display.
    Other(String),
}

impl EventField {
    /// Returns the field as an unsigned integer, if it is one.
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            EventField::U128(value) => Some(*value),
            EventField::I128(value) => u128::try_from(*value).ok(),
            _ => None,
        }
    }

    /// Returns the field as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EventField::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the field as an account identifier, if it is one.
    pub fn as_account(&self) -> Option<&[u8; 32]> {
        match self {
            EventField::Account(account) => Some(account),
            _ => None,
        }
    }
}

impl fmt::Display for EventField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventField::U128(value) => write!(f, "{value}"),
            EventField::I128(value) => write!(f, "{value}"),
            EventField::Bool(value) => write!(f, "{value}"),
            EventField::Text(value) => f.write_str(value),
            EventField::Bytes(bytes) => write!(f, "0x{}", hex::encode(bytes)),
            EventField::Account(account) => write!(f, "0x{}", hex::encode(account)),
            EventField::Other(value) => f.write_str(value),
        }
    }
}

/// A domain event emitted in the block that included a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Section (pallet) the event belongs to, e.g. `common`.
    pub section: String,
    /// Event name, e.g. `CollectionCreated`.
    pub method: String,
    /// Positional event fields, in declaration order.
    pub data: Vec<EventField>,
}

impl EventRecord {
    /// Creates a new event record.
    pub fn new(section: impl Into<String>, method: impl Into<String>, data: Vec<EventField>) -> Self {
        Self {
            section: section.into(),
            method: method.into(),
            data,
        }
    }

    /// Whether this record is `section.method`.
    pub fn is(&self, section: &str, method: &str) -> bool {
        self.section == section && self.method == method
    }
}

/// Structured error carried by a transaction that executed but reverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A business-rule rejection raised by a specific module.
    Module {
        /// Index of the module in the runtime.
        index: u8,
        /// Index of the error within the module.
        error: u8,
    },
    /// Any non-module dispatch failure.
    Other {
        /// Name of the dispatch error kind.
        kind: String,
    },
}

/// One update about a submitted transaction's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Current phase.
    pub phase: TxPhase,
    /// Set when the node flags the update itself as an error.
    pub is_error: bool,
    /// Events of the including block that belong to this transaction.
    pub events: Vec<EventRecord>,
    /// Error trapped during execution, if any.
    pub dispatch_error: Option<DispatchError>,
    /// Hash of the including block, if any.
    pub block_hash: Option<String>,
}

impl Notification {
    /// Creates a notification for `phase` with no events attached.
    pub fn new(phase: TxPhase) -> Self {
        Self {
            phase,
            is_error: false,
            events: Vec::new(),
            dispatch_error: None,
            block_hash: None,
        }
    }

    /// Attaches the including block's events.
    pub fn with_events(mut self, events: Vec<EventRecord>) -> Self {
        self.events = events;
        self
    }

    /// Attaches a dispatch error.
    pub fn with_dispatch_error(mut self, error: DispatchError) -> Self {
        self.dispatch_error = Some(error);
        self
    }

    /// Attaches the including block hash.
    pub fn with_block_hash(mut self, hash: impl Into<String>) -> Self {
        self.block_hash = Some(hash.into());
        self
    }

    /// Flags the notification as an error.
    pub fn flagged_error(mut self) -> Self {
        self.is_error = true;
        self
    }

    /// Whether any attached event has the given method name.
    pub fn has_event_method(&self, method: &str) -> bool {
        self.events.iter().any(|event| event.method == method)
    }
}

/// Human readable name of a module error, resolved from chain metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleErrorName {
    /// Section (pallet) that raised the error.
    pub section: String,
    /// Error variant name.
    pub name: String,
}

impl ModuleErrorName {
    /// Creates a new module error name.
    pub fn new(section: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ModuleErrorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section, self.name)
    }
}

/// Failure payload of a completed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxFailure {
    /// A decoded module error.
    Module(ModuleErrorName),
    /// An error that could not be decoded into a module error.
    Unexpected {
        /// Whatever is known about the failure.
        message: String,
    },
}

impl TxFailure {
    /// Returns the decoded module error, if there is one.
    pub fn module(&self) -> Option<&ModuleErrorName> {
        match self {
            TxFailure::Module(name) => Some(name),
            TxFailure::Unexpected { .. } => None,
        }
    }

    /// Whether this failure is the module error `section.name`.
    pub fn is_module(&self, section: &str, name: &str) -> bool {
        self.module()
            .is_some_and(|module| module.section == section && module.name == name)
    }
}

impl fmt::Display for TxFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxFailure::Module(name) => write!(f, "{name}"),
            TxFailure::Unexpected { message } => {
                write!(f, "Unexpected transaction error: {message}")
            }
        }
    }
}

/// Terminal result of one submission.
pub type CompletionOutcome = std::result::Result<Notification, TxFailure>;
