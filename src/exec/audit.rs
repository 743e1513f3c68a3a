//! The authoritative audit trail of completed and aborted batches.
//!
//! Every abort records its reason, the last confirmed leg, and the
//! estimated financial exposure of the partial execution. This record is
//! what the presentation layer and the operator trust — not a log line.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use crate::arb::route::RouteSummary;

/// How a batch ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum BatchOutcome {
    /// Every leg confirmed
    Completed,
    /// Execution stopped early; the reason is recorded verbatim
    Aborted {
        /// Why the batch stopped
        reason: String,
    },
}

/// The final record of one batch, written exactly once.
#[derive(Clone, Debug, Serialize)]
pub struct BatchRecord {
    /// Batch identifier
    pub batch_id: u64,
    /// The route the batch executed (or refused to execute)
    pub route: RouteSummary,
    /// Completed or Aborted with a reason
    pub outcome: BatchOutcome,
    /// Net profit expected at detection time, reference currency
    pub expected_profit: f64,
    /// Profit realized at completion prices; `None` when the batch aborted
    /// before any value round-tripped back to the start asset
    pub realized_profit: Option<f64>,
    /// Reference-currency value stranded off the start asset by a partial
    /// execution; zero for completed batches and clean refusals
    pub exposure: f64,
    /// Index of the last confirmed leg, if any
    pub last_confirmed_leg: Option<usize>,
    /// When the record was written
    pub finished_at: DateTime<Utc>,
}

impl BatchRecord {
    /// Realized minus expected profit, when a realized figure exists.
    #[must_use]
    pub fn profit_delta(&self) -> Option<f64> {
        self.realized_profit.map(|r| r - self.expected_profit)
    }
}

/// Append-only in-memory history of batch records.
#[derive(Debug, Default)]
pub struct AuditLog {
    /// Records in completion order
    records: RwLock<Vec<BatchRecord>>,
}

impl AuditLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record and logs a one-line summary.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    pub fn push(&self, record: BatchRecord) {
        info!(
            "audit: batch {} {:?}, expected {:.4}, realized {:?}, exposure {:.4}",
            record.batch_id,
            record.outcome,
            record.expected_profit,
            record.realized_profit,
            record.exposure
        );
        #[allow(clippy::unwrap_used)]
        self.records.write().unwrap().push(record);
    }

    /// A copy of the full history, oldest first.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> Vec<BatchRecord> {
        #[allow(clippy::unwrap_used)]
        self.records.read().unwrap().clone()
    }

    /// Number of records.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        #[allow(clippy::unwrap_used)]
        self.records.read().unwrap().len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arb::test_helpers::*;

    fn record(id: u64, outcome: BatchOutcome) -> BatchRecord {
        let (route, _, _, _) = triangle_route(1_000.0);
        BatchRecord {
            batch_id: id,
            route: route.summary(),
            outcome,
            expected_profit: 40.0,
            realized_profit: Some(35.0),
            exposure: 0.0,
            last_confirmed_leg: Some(2),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_history_is_append_only_and_ordered() {
        let log = AuditLog::new();
        assert!(log.is_empty());
        log.push(record(1, BatchOutcome::Completed));
        log.push(record(
            2,
            BatchOutcome::Aborted {
                reason: "verification timed out".to_string(),
            },
        ));

        let history = log.snapshot();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].batch_id, 1);
        assert_eq!(history[1].batch_id, 2);
    }

    #[test]
    fn test_profit_delta_and_serialization() {
        let rec = record(1, BatchOutcome::Completed);
        assert_eq!(rec.profit_delta(), Some(-5.0));

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["batch_id"], 1);
        assert_eq!(json["outcome"], "Completed");
        assert!(json["route"]["net_profit_estimate"].is_number());
    }
}
