//! Core data model types for the `er-queue` crate (spec §3, §4.7).

use chrono::{DateTime, Utc};
use er_core::{ErrorKind, HasErrorKind, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Lifecycle state of a [`QueueItem`] (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Reviewing,
    Confirmed,
    Rejected,
    Merged,
    Expired,
}

impl QueueStatus {
    /// Terminal statuses never transition further (spec §4.7).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QueueStatus::Confirmed | QueueStatus::Rejected | QueueStatus::Merged | QueueStatus::Expired
        )
    }

    pub const ALL: [QueueStatus; 6] = [
        QueueStatus::Pending,
        QueueStatus::Reviewing,
        QueueStatus::Confirmed,
        QueueStatus::Rejected,
        QueueStatus::Merged,
        QueueStatus::Expired,
    ];
}

/// The action a human reviewer took on a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Confirm,
    Reject,
    Merge,
}

impl DecisionAction {
    /// The status a queue item transitions to as a result of this decision.
    pub fn resulting_status(self) -> QueueStatus {
        match self {
            DecisionAction::Confirm => QueueStatus::Confirmed,
            DecisionAction::Reject => QueueStatus::Rejected,
            DecisionAction::Merge => QueueStatus::Merged,
        }
    }
}

/// A reviewer's recorded decision on a queue item (spec §6 "decision").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub action: DecisionAction,
    pub selected_match_id: Option<String>,
    pub notes: Option<String>,
    pub confidence: Option<f64>,
}

/// One potential match offered to the reviewer alongside the candidate
/// record (an id plus whatever score/summary data the caller wants to show).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PotentialMatch {
    pub record_id: String,
    pub score: Option<f64>,
    pub summary: Option<JsonValue>,
}

/// A unit of work awaiting human adjudication (spec §3, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueItem {
    pub id: String,
    pub candidate_record: Record,
    pub potential_matches: Vec<PotentialMatch>,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    pub decision: Option<Decision>,
    /// Higher is more urgent; defaults to 0.
    pub priority: i64,
    pub tags: Option<Vec<String>>,
    pub context: Option<JsonValue>,
}

impl QueueItem {
    pub fn new(id: impl Into<String>, candidate_record: Record, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            candidate_record,
            potential_matches: Vec::new(),
            status: QueueStatus::Pending,
            created_at: now,
            updated_at: now,
            decided_at: None,
            decided_by: None,
            decision: None,
            priority: 0,
            tags: None,
            context: None,
        }
    }
}

/// Filter predicate for [`crate::store::QueueStore::list`] (spec §6 `QueueFilter`).
#[derive(Debug, Clone, Default)]
pub struct QueueFilter {
    pub status: Option<QueueStatus>,
    pub tags: Option<Vec<String>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl QueueFilter {
    pub fn matches(&self, item: &QueueItem) -> bool {
        if let Some(status) = self.status {
            if item.status != status {
                return false;
            }
        }
        if let Some(tags) = &self.tags {
            let item_tags = item.tags.as_deref().unwrap_or(&[]);
            if !tags.iter().any(|t| item_tags.contains(t)) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if item.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if item.created_at > until {
                return false;
            }
        }
        true
    }
}

/// Sort field for `list` (spec §4.7 "Ordering in list").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    CreatedAt,
    UpdatedAt,
    Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl Default for OrderDirection {
    fn default() -> Self {
        OrderDirection::Asc
    }
}

/// Pagination + ordering for `list` (default: `createdAt asc`, spec §4.7).
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub order_by: OrderBy,
    pub order_direction: OrderDirection,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            order_by: OrderBy::CreatedAt,
            order_direction: OrderDirection::Asc,
            limit: None,
            offset: 0,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum QueueError {
    #[error("queue item '{0}' not found")]
    ItemNotFound(String),
    #[error("illegal transition from {from:?} to {to:?} for item '{id}'")]
    IllegalTransition {
        id: String,
        from: QueueStatus,
        to: QueueStatus,
    },
    #[error("queue operation failed: {0}")]
    OperationFailed(String),
}

impl HasErrorKind for QueueError {
    fn kind(&self) -> ErrorKind {
        match self {
            QueueError::ItemNotFound(_) => ErrorKind::NotFound,
            QueueError::IllegalTransition { .. } => ErrorKind::Validation,
            QueueError::OperationFailed(_) => ErrorKind::Server,
        }
    }
}
