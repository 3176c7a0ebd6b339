// Reconciliation outcome per candidate

use super::field_set::FieldSet;
use super::record::{CandidateRecord, RecordId};
use serde::{Deserialize, Serialize};

/// Why a candidate produced no store mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No identifying attribute present
    Empty,
    /// Matched a stored record and nothing differs
    Unchanged,
    /// Candidate has no match key and keyless adds are disabled
    NoMatchKey,
    /// An earlier candidate in the same import already claimed this key
    DuplicateInImport,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Empty => write!(f, "empty"),
            SkipReason::Unchanged => write!(f, "unchanged"),
            SkipReason::NoMatchKey => write!(f, "no match key"),
            SkipReason::DuplicateInImport => write!(f, "duplicate in import"),
        }
    }
}

/// One decision per candidate. Decisions never reference each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Add(CandidateRecord),
    Update { id: RecordId, changes: FieldSet },
    Skip { reason: SkipReason },
}

impl Decision {
    pub fn skip(reason: SkipReason) -> Self {
        Decision::Skip { reason }
    }

    /// True when applying this decision touches the store
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Decision::Skip { .. })
    }
}
