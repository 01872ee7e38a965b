//! Storage for [`QueueItem`]s plus the state-machine-enforcing operations
//! (spec §4.7 "Operations"). `InMemoryQueueStore` is the reference
//! implementation used in tests; a persistent adapter implements the same
//! [`QueueStore`] trait (the adapter itself is out of scope, per spec §1).

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use er_core::Record;

use crate::state_machine::is_legal_transition;
use crate::types::{
    Decision, DecisionAction, ListOptions, OrderBy, OrderDirection, PotentialMatch, QueueError,
    QueueFilter, QueueItem, QueueStatus,
};

/// Storage abstraction the review queue depends on.
pub trait QueueStore: Send + Sync {
    fn add(&self, item: QueueItem) -> Result<QueueItem, QueueError>;
    fn add_batch(&self, items: Vec<QueueItem>) -> Result<Vec<QueueItem>, QueueError>;
    fn get(&self, id: &str) -> Result<Option<QueueItem>, QueueError>;
    fn list(&self, filter: &QueueFilter, options: &ListOptions) -> Result<Vec<QueueItem>, QueueError>;
    fn update_status(
        &self,
        id: &str,
        new_status: QueueStatus,
        decision: Option<Decision>,
        decided_by: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<QueueItem, QueueError>;
    fn delete(&self, id: &str) -> Result<bool, QueueError>;
    fn cleanup(
        &self,
        older_than: DateTime<Utc>,
        status: Option<QueueStatus>,
        limit: Option<usize>,
    ) -> Result<usize, QueueError>;
    fn all(&self) -> Result<Vec<QueueItem>, QueueError>;
}

/// Thread-safe in-memory [`QueueStore`], keyed by item id.
#[derive(Default)]
pub struct InMemoryQueueStore {
    items: DashMap<String, QueueItem>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor mirroring spec §4.7 `add`: builds a fresh
    /// [`QueueItem`] in `pending` status and inserts it.
    pub fn add_candidate(
        &self,
        id: impl Into<String>,
        candidate_record: Record,
        potential_matches: Vec<PotentialMatch>,
        priority: i64,
        now: DateTime<Utc>,
    ) -> Result<QueueItem, QueueError> {
        let mut item = QueueItem::new(id, candidate_record, now);
        item.potential_matches = potential_matches;
        item.priority = priority;
        self.add(item)
    }

    fn decide(
        &self,
        id: &str,
        action: DecisionAction,
        decided_by: Option<String>,
        selected_match_id: Option<String>,
        notes: Option<String>,
        confidence: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<QueueItem, QueueError> {
        let decision = Decision {
            action,
            selected_match_id,
            notes,
            confidence,
        };
        self.update_status(id, action.resulting_status(), Some(decision), decided_by, now)
    }

    pub fn confirm(
        &self,
        id: &str,
        decided_by: Option<String>,
        selected_match_id: Option<String>,
        notes: Option<String>,
        confidence: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<QueueItem, QueueError> {
        self.decide(
            id,
            DecisionAction::Confirm,
            decided_by,
            selected_match_id,
            notes,
            confidence,
            now,
        )
    }

    pub fn reject(
        &self,
        id: &str,
        decided_by: Option<String>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<QueueItem, QueueError> {
        self.decide(id, DecisionAction::Reject, decided_by, None, notes, None, now)
    }

    pub fn merge_decision(
        &self,
        id: &str,
        decided_by: Option<String>,
        selected_match_id: Option<String>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<QueueItem, QueueError> {
        self.decide(
            id,
            DecisionAction::Merge,
            decided_by,
            selected_match_id,
            notes,
            None,
            now,
        )
    }

    /// Mark every non-terminal item older than `older_than` as `expired`
    /// (spec §4.7 transitions: "any non-terminal -> expired").
    pub fn expire_stale(&self, older_than: DateTime<Utc>, now: DateTime<Utc>) -> Result<usize, QueueError> {
        let mut expired = 0;
        for mut entry in self.items.iter_mut() {
            if !entry.status.is_terminal() && entry.created_at < older_than {
                entry.status = QueueStatus::Expired;
                entry.updated_at = now;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

impl QueueStore for InMemoryQueueStore {
    fn add(&self, item: QueueItem) -> Result<QueueItem, QueueError> {
        if self.items.contains_key(&item.id) {
            return Err(QueueError::OperationFailed(format!(
                "queue item '{}' already exists",
                item.id
            )));
        }
        self.items.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    fn add_batch(&self, items: Vec<QueueItem>) -> Result<Vec<QueueItem>, QueueError> {
        items.into_iter().map(|item| self.add(item)).collect()
    }

    fn get(&self, id: &str) -> Result<Option<QueueItem>, QueueError> {
        Ok(self.items.get(id).map(|r| r.clone()))
    }

    fn list(&self, filter: &QueueFilter, options: &ListOptions) -> Result<Vec<QueueItem>, QueueError> {
        let mut out: Vec<QueueItem> = self
            .items
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|item| filter.matches(item))
            .collect();

        out.sort_by(|a, b| {
            let ordering = match options.order_by {
                OrderBy::CreatedAt => a.created_at.cmp(&b.created_at),
                OrderBy::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                OrderBy::Priority => a.priority.cmp(&b.priority),
            };
            match options.order_direction {
                OrderDirection::Asc => ordering,
                OrderDirection::Desc => ordering.reverse(),
            }
        });

        if options.offset > 0 {
            out = out.into_iter().skip(options.offset).collect();
        }
        if let Some(limit) = options.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn update_status(
        &self,
        id: &str,
        new_status: QueueStatus,
        decision: Option<Decision>,
        decided_by: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<QueueItem, QueueError> {
        let mut entry = self
            .items
            .get_mut(id)
            .ok_or_else(|| QueueError::ItemNotFound(id.to_string()))?;
        if !is_legal_transition(entry.status, new_status) {
            return Err(QueueError::IllegalTransition {
                id: id.to_string(),
                from: entry.status,
                to: new_status,
            });
        }
        entry.status = new_status;
        entry.updated_at = now;
        if decision.is_some() {
            entry.decision = decision;
            entry.decided_by = decided_by;
            entry.decided_at = Some(now);
        }
        Ok(entry.clone())
    }

    fn delete(&self, id: &str) -> Result<bool, QueueError> {
        Ok(self.items.remove(id).is_some())
    }

    fn cleanup(
        &self,
        older_than: DateTime<Utc>,
        status: Option<QueueStatus>,
        limit: Option<usize>,
    ) -> Result<usize, QueueError> {
        let mut candidates: Vec<String> = self
            .items
            .iter()
            .filter(|entry| entry.created_at < older_than)
            .filter(|entry| status.is_none_or(|s| entry.status == s))
            .map(|entry| entry.id.clone())
            .collect();
        candidates.sort();
        if let Some(limit) = limit {
            candidates.truncate(limit);
        }
        let removed = candidates.len();
        for id in candidates {
            self.items.remove(&id);
        }
        Ok(removed)
    }

    fn all(&self) -> Result<Vec<QueueItem>, QueueError> {
        Ok(self.items.iter().map(|entry| entry.value().clone()).collect())
    }
}

/// Convenience: compute a cutoff timestamp `duration` in the past from `now`.
pub fn cutoff(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    now - duration
}

#[cfg(test)]
mod tests {
    use super::*;
    use er_core::Record;

    fn item(id: &str, now: DateTime<Utc>) -> QueueItem {
        QueueItem::new(id, Record::new(), now)
    }

    #[test]
    fn add_then_get_round_trips() {
        let store = InMemoryQueueStore::new();
        let now = Utc::now();
        store.add(item("q1", now)).unwrap();
        assert_eq!(store.get("q1").unwrap().unwrap().status, QueueStatus::Pending);
    }

    #[test]
    fn duplicate_add_fails() {
        let store = InMemoryQueueStore::new();
        let now = Utc::now();
        store.add(item("q1", now)).unwrap();
        assert!(store.add(item("q1", now)).is_err());
    }

    #[test]
    fn pending_to_reviewing_to_confirmed_succeeds() {
        let store = InMemoryQueueStore::new();
        let now = Utc::now();
        store.add(item("q1", now)).unwrap();
        store
            .update_status("q1", QueueStatus::Reviewing, None, None, now)
            .unwrap();
        let confirmed = store
            .confirm("q1", Some("alice".into()), None, None, None, now)
            .unwrap();
        assert_eq!(confirmed.status, QueueStatus::Confirmed);
        assert_eq!(confirmed.decided_by.as_deref(), Some("alice"));
    }

    #[test]
    fn confirmed_to_pending_is_illegal() {
        let store = InMemoryQueueStore::new();
        let now = Utc::now();
        store.add(item("q1", now)).unwrap();
        store.confirm("q1", None, None, None, None, now).unwrap();
        let err = store
            .update_status("q1", QueueStatus::Pending, None, None, now)
            .unwrap_err();
        assert!(matches!(err, QueueError::IllegalTransition { .. }));
    }

    #[test]
    fn list_orders_by_created_at_ascending_by_default() {
        let store = InMemoryQueueStore::new();
        let t0 = Utc::now();
        store.add(item("first", t0)).unwrap();
        store.add(item("second", t0 + Duration::seconds(1))).unwrap();
        let items = store.list(&QueueFilter::default(), &ListOptions::default()).unwrap();
        assert_eq!(items.iter().map(|i| i.id.clone()).collect::<Vec<_>>(), vec!["first", "second"]);
    }

    #[test]
    fn cleanup_removes_matching_old_items_up_to_limit() {
        let store = InMemoryQueueStore::new();
        let old = Utc::now() - Duration::days(10);
        store.add(item("a", old)).unwrap();
        store.add(item("b", old)).unwrap();
        let removed = store.cleanup(Utc::now(), Some(QueueStatus::Pending), Some(1)).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.all().unwrap().len(), 1);
    }
}
