//! Queue metrics (spec §4.7 "Metrics"): status counts, average wait time,
//! oldest pending item, and throughput windows. All of these are derived by
//! grouping the items collection, matching spec's "Aging, priority, and
//! reviewer-accuracy reports are derived by grouping the items collection."
//! — there is no separate metrics store, just read-only aggregation over
//! whatever [`crate::store::QueueStore::all`] returns.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::types::{QueueItem, QueueStatus};

/// Snapshot of queue health, recomputed on demand from the current items.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStats {
    pub total: usize,
    pub by_status: BTreeMap<QueueStatus, usize>,
    /// Mean `decidedAt - createdAt` across every item with a decision.
    pub avg_wait_time: Option<Duration>,
    pub oldest_pending: Option<DateTime<Utc>>,
    pub throughput_24h: usize,
    pub throughput_7d: usize,
    pub throughput_30d: usize,
}

/// Compute [`QueueStats`] over `items` as of `now`.
pub fn compute_stats(items: &[QueueItem], now: DateTime<Utc>) -> QueueStats {
    let mut by_status: BTreeMap<QueueStatus, usize> = BTreeMap::new();
    for status in QueueStatus::ALL {
        by_status.insert(status, 0);
    }
    let mut wait_sum = Duration::zero();
    let mut wait_count = 0i64;
    let mut oldest_pending: Option<DateTime<Utc>> = None;
    let mut throughput_24h = 0;
    let mut throughput_7d = 0;
    let mut throughput_30d = 0;

    for item in items {
        *by_status.entry(item.status).or_insert(0) += 1;

        if let Some(decided_at) = item.decided_at {
            wait_sum = wait_sum + (decided_at - item.created_at);
            wait_count += 1;

            let age = now - decided_at;
            if age <= Duration::hours(24) {
                throughput_24h += 1;
            }
            if age <= Duration::days(7) {
                throughput_7d += 1;
            }
            if age <= Duration::days(30) {
                throughput_30d += 1;
            }
        }

        if item.status == QueueStatus::Pending {
            oldest_pending = Some(match oldest_pending {
                Some(current) if current <= item.created_at => current,
                _ => item.created_at,
            });
        }
    }

    let avg_wait_time = if wait_count > 0 {
        Some(wait_sum / wait_count as i32)
    } else {
        None
    };

    QueueStats {
        total: items.len(),
        by_status,
        avg_wait_time,
        oldest_pending,
        throughput_24h,
        throughput_7d,
        throughput_30d,
    }
}

/// One bucket of the "how long have pending items been waiting" report.
#[derive(Debug, Clone, PartialEq)]
pub struct AgingBucket {
    pub label: &'static str,
    pub count: usize,
}

/// Bucket pending items by age: `<1h`, `1-24h`, `1-7d`, `>7d`.
pub fn aging_report(items: &[QueueItem], now: DateTime<Utc>) -> Vec<AgingBucket> {
    let mut under_1h = 0;
    let mut under_24h = 0;
    let mut under_7d = 0;
    let mut over_7d = 0;

    for item in items.iter().filter(|i| !i.status.is_terminal()) {
        let age = now - item.created_at;
        if age < Duration::hours(1) {
            under_1h += 1;
        } else if age < Duration::hours(24) {
            under_24h += 1;
        } else if age < Duration::days(7) {
            under_7d += 1;
        } else {
            over_7d += 1;
        }
    }

    vec![
        AgingBucket { label: "<1h", count: under_1h },
        AgingBucket { label: "1h-24h", count: under_24h },
        AgingBucket { label: "1d-7d", count: under_7d },
        AgingBucket { label: ">7d", count: over_7d },
    ]
}

/// Count of non-terminal items grouped by priority value, descending by
/// priority so the most urgent bucket is first.
pub fn priority_report(items: &[QueueItem]) -> Vec<(i64, usize)> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for item in items.iter().filter(|i| !i.status.is_terminal()) {
        *counts.entry(item.priority).or_insert(0) += 1;
    }
    let mut out: Vec<(i64, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.0.cmp(&a.0));
    out
}

/// Per-reviewer decision counts, grouped by the action they took. Useful
/// for spotting a reviewer who rejects (or confirms) far more than peers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReviewerAccuracy {
    pub confirmed: usize,
    pub rejected: usize,
    pub merged: usize,
}

pub fn reviewer_accuracy_report(items: &[QueueItem]) -> BTreeMap<String, ReviewerAccuracy> {
    let mut out: BTreeMap<String, ReviewerAccuracy> = BTreeMap::new();
    for item in items {
        let (Some(reviewer), Some(decision)) = (&item.decided_by, &item.decision) else {
            continue;
        };
        let entry = out.entry(reviewer.clone()).or_default();
        match decision.action {
            crate::types::DecisionAction::Confirm => entry.confirmed += 1,
            crate::types::DecisionAction::Reject => entry.rejected += 1,
            crate::types::DecisionAction::Merge => entry.merged += 1,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Decision, DecisionAction};
    use er_core::Record;

    fn pending(id: &str, created_at: DateTime<Utc>) -> QueueItem {
        QueueItem::new(id, Record::new(), created_at)
    }

    fn decided(id: &str, created_at: DateTime<Utc>, decided_at: DateTime<Utc>, reviewer: &str) -> QueueItem {
        let mut item = pending(id, created_at);
        item.status = QueueStatus::Confirmed;
        item.decided_at = Some(decided_at);
        item.decided_by = Some(reviewer.to_string());
        item.decision = Some(Decision {
            action: DecisionAction::Confirm,
            selected_match_id: None,
            notes: None,
            confidence: None,
        });
        item
    }

    #[test]
    fn stats_total_equals_sum_of_by_status() {
        let now = Utc::now();
        let items = vec![pending("a", now), decided("b", now, now, "alice")];
        let stats = compute_stats(&items, now);
        assert_eq!(stats.total, stats.by_status.values().sum::<usize>());
    }

    #[test]
    fn avg_wait_time_matches_single_decided_item() {
        let now = Utc::now();
        let created = now - Duration::hours(2);
        let items = vec![decided("a", created, now, "alice")];
        let stats = compute_stats(&items, now);
        assert_eq!(stats.avg_wait_time, Some(Duration::hours(2)));
    }

    #[test]
    fn oldest_pending_is_the_earliest_created_pending_item() {
        let now = Utc::now();
        let older = now - Duration::days(1);
        let items = vec![pending("a", now), pending("b", older)];
        let stats = compute_stats(&items, now);
        assert_eq!(stats.oldest_pending, Some(older));
    }

    #[test]
    fn reviewer_accuracy_groups_by_reviewer_and_action() {
        let now = Utc::now();
        let items = vec![decided("a", now, now, "alice"), decided("b", now, now, "alice")];
        let report = reviewer_accuracy_report(&items);
        assert_eq!(report.get("alice").unwrap().confirmed, 2);
    }
}
