//! The legal-transition graph for [`QueueStatus`] (spec §4.7):
//!
//! ```text
//! pending    -> reviewing | confirmed | rejected | merged
//! reviewing  -> confirmed | rejected | merged
//! any non-terminal -> expired
//! ```
//!
//! Terminal states (`confirmed`, `rejected`, `merged`, `expired`) never
//! transition further. This module is pure and has no notion of storage;
//! [`crate::store::InMemoryQueueStore`] consults it before mutating an item.

use crate::types::QueueStatus;

/// Whether `from -> to` is a legal transition.
pub fn is_legal_transition(from: QueueStatus, to: QueueStatus) -> bool {
    if from.is_terminal() {
        return false;
    }
    if to == QueueStatus::Expired {
        return true;
    }
    match from {
        QueueStatus::Pending => matches!(
            to,
            QueueStatus::Reviewing | QueueStatus::Confirmed | QueueStatus::Rejected | QueueStatus::Merged
        ),
        QueueStatus::Reviewing => matches!(
            to,
            QueueStatus::Confirmed | QueueStatus::Rejected | QueueStatus::Merged
        ),
        _ => false,
    }
}
