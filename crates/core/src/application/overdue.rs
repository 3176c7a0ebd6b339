//! Overdue Evaluator - recomputes the follow-up flag from each record's cadence
//!
//! `overdue = days since last contact > max gap of the cadence`. The boundary
//! is exclusive: a weekly contact reached exactly 7 days ago is not overdue.
//! Records without a last-contacted date or a cadence are skipped, and a
//! cadence with no rule is never overdue.

use crate::application::retry::RetryPolicy;
use crate::domain::{Cadence, CadenceRules, ExistingRecord, FieldChange, FieldSet, RecordId};
use crate::error::{Result, SyncError};
use crate::port::{ContactStore, StoreError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Computed flag for one evaluated record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverdueFlag {
    pub id: RecordId,
    pub label: String,
    pub overdue: bool,
    /// Flag currently stored on the record
    pub stored: bool,
}

impl OverdueFlag {
    pub fn is_changed(&self) -> bool {
        self.overdue != self.stored
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverdueReport {
    pub flags: Vec<OverdueFlag>,
    /// Records missing a last-contacted date or a cadence
    pub skipped: usize,
}

impl OverdueReport {
    /// Flags that differ from the stored value, in snapshot order
    pub fn changes(&self) -> impl Iterator<Item = &OverdueFlag> {
        self.flags.iter().filter(|f| f.is_changed())
    }
}

/// Outcome of a full evaluation pass against the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueSummary {
    /// Records whose flag was written
    pub updated: usize,
    pub skipped: usize,
    pub unchanged: usize,
    /// Writes that failed after retries
    pub failed: usize,
}

pub fn is_overdue(
    last_contacted: NaiveDate,
    cadence: &Cadence,
    rules: &CadenceRules,
    today: NaiveDate,
) -> bool {
    match rules.max_gap_days(cadence) {
        Some(max_gap) => (today - last_contacted).num_days() > max_gap,
        None => false,
    }
}

/// Pure pass over a snapshot
pub fn evaluate(existing: &[ExistingRecord], rules: &CadenceRules, today: NaiveDate) -> OverdueReport {
    let mut report = OverdueReport::default();
    for record in existing {
        let (Some(last_contacted), Some(cadence)) =
            (record.fields.last_contacted, record.fields.cadence.as_ref())
        else {
            report.skipped += 1;
            continue;
        };
        report.flags.push(OverdueFlag {
            id: record.id.clone(),
            label: record.label().to_string(),
            overdue: is_overdue(last_contacted, cadence, rules, today),
            stored: record.overdue,
        });
    }
    report
}

/// Evaluates and writes back changed flags, one update per record
pub struct OverdueEvaluator {
    rules: CadenceRules,
    retry_policy: RetryPolicy,
}

impl OverdueEvaluator {
    pub fn new(rules: CadenceRules, retry_policy: RetryPolicy) -> Self {
        Self {
            rules,
            retry_policy,
        }
    }

    /// Fetch failures abort the pass; a failed write is counted and the
    /// pass continues with the next record.
    pub async fn run(&self, store: &dyn ContactStore, today: NaiveDate) -> Result<OverdueSummary> {
        let existing = self
            .retry_policy
            .attempt(|| store.fetch_all(), |_, _: &StoreError| async {})
            .await
            .map_err(|failure| SyncError::Upstream(failure.error))?;

        let report = evaluate(&existing, &self.rules, today);
        let mut summary = OverdueSummary {
            skipped: report.skipped,
            ..Default::default()
        };

        for flag in &report.flags {
            if !flag.is_changed() {
                summary.unchanged += 1;
                continue;
            }
            let changes = FieldSet::new().with(FieldChange::Overdue(flag.overdue));
            let written = self
                .retry_policy
                .attempt(|| store.update(&flag.id, &changes), |_, _: &StoreError| async {})
                .await;
            match written {
                Ok(()) => {
                    debug!(record_id = %flag.id, overdue = flag.overdue, "Overdue flag written");
                    summary.updated += 1;
                }
                Err(failure) => {
                    warn!(
                        record_id = %flag.id,
                        record = %flag.label,
                        attempts = failure.attempts,
                        error = %failure.error,
                        "Failed to write overdue flag"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            updated = summary.updated,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            failed = summary.failed,
            today = %today,
            "Overdue evaluation finished"
        );
        Ok(summary)
    }
}
