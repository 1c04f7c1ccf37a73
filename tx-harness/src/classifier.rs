//! Pure classification of a single [`Notification`].

use crate::error::{ProtocolInconsistencySnafu, Result};
use crate::notification::{Notification, EXTRINSIC_FAILED, EXTRINSIC_SUCCESS};

/// Classification of one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Not yet included, keep waiting.
    Pending,
    /// Included and executed successfully.
    Success,
    /// Rejected by the pool, flagged as an error, or reverted during execution.
    Failed,
}

/// Classifies a notification into pending, success or failure.
///
/// A notification that is included in a block but carries neither the
/// `ExtrinsicSuccess` nor the `ExtrinsicFailed` marker is reported as
/// [`crate::Error::ProtocolInconsistency`]; nothing else would ever resolve it.
pub fn classify(notification: &Notification) -> Result<TxStatus> {
    if notification.is_error || notification.phase.is_rejected() {
        return Ok(TxStatus::Failed);
    }

    if !notification.phase.is_included() {
        return Ok(TxStatus::Pending);
    }

    if notification.has_event_method(EXTRINSIC_FAILED) {
        Ok(TxStatus::Failed)
    } else if notification.has_event_method(EXTRINSIC_SUCCESS) {
        Ok(TxStatus::Success)
    } else {
        ProtocolInconsistencySnafu {
            phase: notification.phase,
        }
        .fail()
    }
}
