use crate::ingest::{IngestReport, ItemOutcome};
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion activity.
#[derive(Default)]
pub struct IngestMetrics {
    runs_completed: AtomicU64,
    items_stored: AtomicU64,
    items_skipped: AtomicU64,
    points_inserted: AtomicU64,
    points_updated: AtomicU64,
    collections_created: AtomicU64,
}

impl IngestMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished workflow report into the counters.
    pub fn record_report(&self, report: &IngestReport) {
        let stored = report
            .items
            .iter()
            .filter(|item| matches!(item, ItemOutcome::Stored { .. }))
            .count() as u64;
        let skipped = report.items.len() as u64 - stored;

        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.items_stored.fetch_add(stored, Ordering::Relaxed);
        self.items_skipped.fetch_add(skipped, Ordering::Relaxed);
        self.points_inserted
            .fetch_add(report.inserted as u64, Ordering::Relaxed);
        self.points_updated
            .fetch_add(report.updated as u64, Ordering::Relaxed);
    }

    /// Count a collection that did not exist before.
    pub fn record_collection_created(&self) {
        self.collections_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            items_stored: self.items_stored.load(Ordering::Relaxed),
            items_skipped: self.items_skipped.load(Ordering::Relaxed),
            points_inserted: self.points_inserted.load(Ordering::Relaxed),
            points_updated: self.points_updated.load(Ordering::Relaxed),
            collections_created: self.collections_created.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Workflow runs (PDF or JSON) that produced a report.
    pub runs_completed: u64,
    /// Items written to the store since startup.
    pub items_stored: u64,
    /// Items skipped for any reason since startup.
    pub items_skipped: u64,
    /// Points that were new when written.
    pub points_inserted: u64,
    /// Points that replaced an existing id.
    pub points_updated: u64,
    /// Collections created through this process.
    pub collections_created: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::SkipReason;
    use crate::qdrant::PointId;

    #[test]
    fn records_reports() {
        let metrics = IngestMetrics::new();
        metrics.record_report(&IngestReport {
            collection: "docs".into(),
            tenant_id: "t1".into(),
            items: vec![
                ItemOutcome::Stored {
                    id: PointId::Num(1),
                    source: "a".into(),
                },
                ItemOutcome::Stored {
                    id: PointId::Num(2),
                    source: "b".into(),
                },
                ItemOutcome::Skipped {
                    source: "c".into(),
                    reason: SkipReason::EmptyText,
                },
            ],
            inserted: 1,
            updated: 1,
        });
        metrics.record_collection_created();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.runs_completed, 1);
        assert_eq!(snapshot.items_stored, 2);
        assert_eq!(snapshot.items_skipped, 1);
        assert_eq!(snapshot.points_inserted, 1);
        assert_eq!(snapshot.points_updated, 1);
        assert_eq!(snapshot.collections_created, 1);
    }

    #[test]
    fn snapshot_starts_empty() {
        assert_eq!(IngestMetrics::new().snapshot(), MetricsSnapshot::default());
    }
}
