//! Reconciler - matches imported candidates against the stored snapshot
//!
//! Pure and deterministic: one [`Decision`] per candidate, in candidate order.
//!
//! Matching rules:
//! - Stored records are indexed by trimmed match key. When two stored records
//!   share a key the first one in snapshot order wins and the rest are ignored.
//! - A candidate with no identifying attribute is skipped as `empty`.
//! - A keyless candidate follows [`KeylessPolicy`].
//! - A repeated key inside the same import is reconciled once; later copies
//!   are skipped.
//! - A matched pair yields `Update` with only the differing fields, or
//!   `Skip(unchanged)`. Blank incoming values never clear stored ones.

use crate::domain::record::{text_eq, ContactFields};
use crate::domain::{
    CandidateRecord, Decision, ExistingRecord, FieldChange, FieldSet, SkipReason,
};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// What to do with a meaningful candidate that carries no match key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeylessPolicy {
    /// Skip with reason `no match key`. Re-imports stay idempotent.
    #[default]
    Skip,
    /// Create a new record every time the candidate is imported
    Add,
}

impl std::str::FromStr for KeylessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(KeylessPolicy::Skip),
            "add" => Ok(KeylessPolicy::Add),
            other => Err(format!("unknown keyless policy '{}', expected skip|add", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    pub keyless: KeylessPolicy,
}

/// Reconcile with default options
pub fn reconcile(existing: &[ExistingRecord], candidates: &[CandidateRecord]) -> Vec<Decision> {
    reconcile_with(existing, candidates, &ReconcileOptions::default())
}

pub fn reconcile_with(
    existing: &[ExistingRecord],
    candidates: &[CandidateRecord],
    options: &ReconcileOptions,
) -> Vec<Decision> {
    let index = index_by_key(existing);
    let mut claimed: HashSet<&str> = HashSet::with_capacity(candidates.len());

    let decisions: Vec<Decision> = candidates
        .iter()
        .map(|candidate| decide(candidate, &index, &mut claimed, options))
        .collect();

    debug!(
        existing = existing.len(),
        candidates = candidates.len(),
        adds = decisions.iter().filter(|d| matches!(d, Decision::Add(_))).count(),
        updates = decisions
            .iter()
            .filter(|d| matches!(d, Decision::Update { .. }))
            .count(),
        "Reconciled candidates"
    );

    decisions
}

fn decide<'a>(
    candidate: &'a CandidateRecord,
    index: &HashMap<&str, &ExistingRecord>,
    claimed: &mut HashSet<&'a str>,
    options: &ReconcileOptions,
) -> Decision {
    if !candidate.is_meaningful() {
        return Decision::skip(SkipReason::Empty);
    }

    let Some(key) = candidate.normalized_key() else {
        return match options.keyless {
            KeylessPolicy::Skip => Decision::skip(SkipReason::NoMatchKey),
            KeylessPolicy::Add => Decision::Add(candidate.clone()),
        };
    };

    if !claimed.insert(key) {
        return Decision::skip(SkipReason::DuplicateInImport);
    }

    match index.get(key) {
        Some(stored) => {
            let changes = diff_fields(&stored.fields, &candidate.fields);
            if changes.is_empty() {
                Decision::skip(SkipReason::Unchanged)
            } else {
                Decision::Update {
                    id: stored.id.clone(),
                    changes,
                }
            }
        }
        None => Decision::Add(candidate.clone()),
    }
}

fn index_by_key(existing: &[ExistingRecord]) -> HashMap<&str, &ExistingRecord> {
    let mut index = HashMap::with_capacity(existing.len());
    for record in existing {
        let Some(key) = record.normalized_key() else {
            continue;
        };
        match index.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(kept) => {
                warn!(
                    match_key = %key,
                    kept_id = %kept.get().id,
                    ignored_id = %record.id,
                    "Duplicate match key in store snapshot, keeping first"
                );
            }
        }
    }
    index
}

/// Fields whose normalized incoming value differs from the stored one.
///
/// Text compares trimmed and case-insensitive; dates compare exactly.
pub fn diff_fields(stored: &ContactFields, incoming: &ContactFields) -> FieldSet {
    let mut changes = FieldSet::new();

    let text_fields: [(&str, &str, fn(String) -> FieldChange); 7] = [
        (stored.name.as_str(), incoming.name.as_str(), FieldChange::Name),
        (stored.email.as_str(), incoming.email.as_str(), FieldChange::Email),
        (stored.phone.as_str(), incoming.phone.as_str(), FieldChange::Phone),
        (stored.company.as_str(), incoming.company.as_str(), FieldChange::Company),
        (stored.position.as_str(), incoming.position.as_str(), FieldChange::Position),
        (stored.industry.as_str(), incoming.industry.as_str(), FieldChange::Industry),
        (
            stored.field_of_work.as_str(),
            incoming.field_of_work.as_str(),
            FieldChange::FieldOfWork,
        ),
    ];
    for (old, new, make) in text_fields {
        let new = new.trim();
        if !new.is_empty() && !text_eq(old, new) {
            changes.insert(make(new.to_string()));
        }
    }

    if let Some(date) = incoming.connected_on {
        if stored.connected_on != Some(date) {
            changes.insert(FieldChange::ConnectedOn(date));
        }
    }
    if let Some(date) = incoming.last_contacted {
        if stored.last_contacted != Some(date) {
            changes.insert(FieldChange::LastContacted(date));
        }
    }
    if let Some(cadence) = &incoming.cadence {
        let same = stored
            .cadence
            .as_ref()
            .is_some_and(|old| text_eq(old.as_str(), cadence.as_str()));
        if !same {
            changes.insert(FieldChange::Cadence(cadence.clone()));
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cadence, Field};
    use chrono::NaiveDate;

    fn stored(id: &str, key: &str, company: &str) -> ExistingRecord {
        ExistingRecord {
            id: id.to_string(),
            match_key: key.to_string(),
            fields: ContactFields {
                company: company.to_string(),
                ..Default::default()
            },
            overdue: false,
        }
    }

    fn candidate(key: &str, company: &str) -> CandidateRecord {
        CandidateRecord::new(
            key,
            ContactFields {
                company: company.to_string(),
                ..Default::default()
            },
        )
    }

    /// Fold decisions back into the snapshot the way the store would
    fn fold(existing: &mut Vec<ExistingRecord>, decisions: &[Decision]) {
        for (n, decision) in decisions.iter().enumerate() {
            match decision {
                Decision::Add(c) => {
                    existing.push(ExistingRecord::from_candidate(format!("new-{}", n), c))
                }
                Decision::Update { id, changes } => {
                    if let Some(r) = existing.iter_mut().find(|r| &r.id == id) {
                        r.apply(changes);
                    }
                }
                Decision::Skip { .. } => {}
            }
        }
    }

    #[test]
    fn test_normalized_equal_company_is_unchanged() {
        let existing = vec![stored("1", "u1", "Acme")];
        let decisions = reconcile(&existing, &[candidate("u1", "acme ")]);
        assert_eq!(decisions, vec![Decision::skip(SkipReason::Unchanged)]);
    }

    #[test]
    fn test_changed_company_is_minimal_update() {
        let existing = vec![stored("1", "u1", "Acme")];
        let decisions = reconcile(&existing, &[candidate("u1", "Globex")]);
        assert_eq!(
            decisions,
            vec![Decision::Update {
                id: "1".to_string(),
                changes: FieldSet::new().with(FieldChange::Company("Globex".to_string())),
            }]
        );
    }

    #[test]
    fn test_unmatched_key_is_add() {
        let existing = vec![stored("1", "u1", "Acme")];
        let new = candidate("u2", "X");
        let decisions = reconcile(&existing, &[new.clone()]);
        assert_eq!(decisions, vec![Decision::Add(new)]);
    }

    #[test]
    fn test_match_key_is_trimmed() {
        let existing = vec![stored("1", "  u1 ", "Acme")];
        let decisions = reconcile(&existing, &[candidate("u1", "Acme")]);
        assert_eq!(decisions, vec![Decision::skip(SkipReason::Unchanged)]);
    }

    #[test]
    fn test_one_decision_per_candidate_in_order() {
        let existing = vec![stored("1", "u1", "Acme")];
        let candidates = vec![
            candidate("u2", "B"),
            CandidateRecord::default(),
            candidate("u1", "Globex"),
        ];
        let decisions = reconcile(&existing, &candidates);
        assert_eq!(decisions.len(), 3);
        assert!(matches!(decisions[0], Decision::Add(_)));
        assert_eq!(decisions[1], Decision::skip(SkipReason::Empty));
        assert!(matches!(decisions[2], Decision::Update { .. }));
    }

    #[test]
    fn test_untouched_fields_absent_from_update() {
        let mut existing = stored("1", "u1", "Acme");
        existing.fields.name = "Jane Doe".to_string();
        existing.fields.position = "Engineer".to_string();

        let mut incoming = candidate("u1", "Acme");
        incoming.fields.name = "jane doe".to_string();
        incoming.fields.position = "Staff Engineer".to_string();

        let decisions = reconcile(&[existing], &[incoming]);
        let Decision::Update { changes, .. } = &decisions[0] else {
            panic!("expected update, got {:?}", decisions[0]);
        };
        assert_eq!(changes.fields().collect::<Vec<_>>(), vec![Field::Position]);
    }

    #[test]
    fn test_blank_incoming_value_never_clears() {
        let mut existing = stored("1", "u1", "Acme");
        existing.fields.cadence = Some(Cadence::Weekly);
        existing.fields.last_contacted = NaiveDate::from_ymd_opt(2024, 1, 2);

        let decisions = reconcile(&[existing], &[candidate("u1", "")]);
        assert_eq!(decisions, vec![Decision::skip(SkipReason::Unchanged)]);
    }

    #[test]
    fn test_dates_compare_exactly() {
        let mut existing = stored("1", "u1", "Acme");
        existing.fields.connected_on = NaiveDate::from_ymd_opt(2023, 3, 15);

        let mut incoming = candidate("u1", "Acme");
        incoming.fields.connected_on = NaiveDate::from_ymd_opt(2023, 3, 16);

        let decisions = reconcile(&[existing], &[incoming]);
        let Decision::Update { changes, .. } = &decisions[0] else {
            panic!("expected update");
        };
        assert_eq!(
            changes.get(Field::ConnectedOn),
            Some(&FieldChange::ConnectedOn(
                NaiveDate::from_ymd_opt(2023, 3, 16).unwrap()
            ))
        );
    }

    #[test]
    fn test_empty_candidate_skipped() {
        let mut only_email = CandidateRecord::default();
        only_email.fields.email = "x@y.z".to_string();
        let decisions = reconcile(&[], &[only_email]);
        assert_eq!(decisions, vec![Decision::skip(SkipReason::Empty)]);
    }

    #[test]
    fn test_keyless_policy() {
        let keyless = candidate("   ", "Acme");

        let skipped = reconcile(&[], &[keyless.clone()]);
        assert_eq!(skipped, vec![Decision::skip(SkipReason::NoMatchKey)]);

        let options = ReconcileOptions {
            keyless: KeylessPolicy::Add,
        };
        let added = reconcile_with(&[], &[keyless.clone()], &options);
        assert_eq!(added, vec![Decision::Add(keyless)]);
    }

    #[test]
    fn test_keyless_policy_parse() {
        assert_eq!("ADD".parse::<KeylessPolicy>(), Ok(KeylessPolicy::Add));
        assert_eq!(" skip".parse::<KeylessPolicy>(), Ok(KeylessPolicy::Skip));
        assert!("reject".parse::<KeylessPolicy>().is_err());
    }

    #[test]
    fn test_duplicate_stored_key_first_wins() {
        let existing = vec![stored("1", "u1", "Acme"), stored("2", "u1", "Globex")];
        let decisions = reconcile(&existing, &[candidate("u1", "Initech")]);
        assert_eq!(
            decisions,
            vec![Decision::Update {
                id: "1".to_string(),
                changes: FieldSet::new().with(FieldChange::Company("Initech".to_string())),
            }]
        );
    }

    #[test]
    fn test_duplicate_key_in_import_reconciled_once() {
        let decisions = reconcile(&[], &[candidate("u9", "A"), candidate(" u9", "B")]);
        assert!(matches!(decisions[0], Decision::Add(_)));
        assert_eq!(decisions[1], Decision::skip(SkipReason::DuplicateInImport));
    }

    #[test]
    fn test_matched_key_never_adds() {
        let existing = vec![stored("1", "u1", "Acme"), stored("2", "u2", "Globex")];
        let candidates = vec![
            candidate("u1", "Acme"),
            candidate("u2", "Other"),
            candidate("u1 ", "Changed"),
        ];
        for decision in reconcile(&existing, &candidates) {
            assert!(!matches!(decision, Decision::Add(_)));
        }
    }

    #[test]
    fn test_second_run_after_fold_is_all_skips() {
        let mut existing = vec![stored("1", "u1", "Acme"), stored("2", "u2", "Globex")];
        let mut jane = candidate("u3", "Initech");
        jane.fields.name = "Jane".to_string();
        jane.fields.connected_on = NaiveDate::from_ymd_opt(2022, 5, 1);
        let candidates = vec![
            candidate("u1", "Acme Corp"),
            candidate("u2", "globex"),
            jane,
            CandidateRecord::default(),
        ];

        let first = reconcile(&existing, &candidates);
        assert!(first.iter().any(Decision::is_mutation));
        fold(&mut existing, &first);

        let second = reconcile(&existing, &candidates);
        assert!(
            second.iter().all(|d| matches!(d, Decision::Skip { .. })),
            "second run produced mutations: {:?}",
            second
        );
    }
}
