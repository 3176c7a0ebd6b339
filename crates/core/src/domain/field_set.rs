// Closed set of writable contact fields

use super::cadence::Cadence;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Field discriminant, one per writable store property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Name,
    Email,
    Phone,
    Company,
    Position,
    Industry,
    FieldOfWork,
    ConnectedOn,
    LastContacted,
    Cadence,
    Overdue,
}

/// A single field value to write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value")]
pub enum FieldChange {
    Name(String),
    Email(String),
    Phone(String),
    Company(String),
    Position(String),
    Industry(String),
    FieldOfWork(String),
    ConnectedOn(NaiveDate),
    LastContacted(NaiveDate),
    Cadence(Cadence),
    Overdue(bool),
}

impl FieldChange {
    pub fn field(&self) -> Field {
        match self {
            FieldChange::Name(_) => Field::Name,
            FieldChange::Email(_) => Field::Email,
            FieldChange::Phone(_) => Field::Phone,
            FieldChange::Company(_) => Field::Company,
            FieldChange::Position(_) => Field::Position,
            FieldChange::Industry(_) => Field::Industry,
            FieldChange::FieldOfWork(_) => Field::FieldOfWork,
            FieldChange::ConnectedOn(_) => Field::ConnectedOn,
            FieldChange::LastContacted(_) => Field::LastContacted,
            FieldChange::Cadence(_) => Field::Cadence,
            FieldChange::Overdue(_) => Field::Overdue,
        }
    }
}

/// Partial update payload: at most one change per field, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet {
    changes: Vec<FieldChange>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a change, replacing any earlier change to the same field
    pub fn insert(&mut self, change: FieldChange) {
        let field = change.field();
        match self.changes.iter_mut().find(|c| c.field() == field) {
            Some(slot) => *slot = change,
            None => self.changes.push(change),
        }
    }

    pub fn with(mut self, change: FieldChange) -> Self {
        self.insert(change);
        self
    }

    pub fn get(&self, field: Field) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field() == field)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.get(field).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.changes.iter().map(FieldChange::field)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldChange> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a FieldChange;
    type IntoIter = std::slice::Iter<'a, FieldChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}
