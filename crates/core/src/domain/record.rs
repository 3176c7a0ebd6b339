// Contact records: freshly imported candidates and stored records

use super::cadence::Cadence;
use super::field_set::{FieldChange, FieldSet};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Opaque identifier assigned by the contact store
pub type RecordId = String;

/// Tracked contact attributes shared by candidates and stored records.
///
/// Text fields use the empty string for "absent".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFields {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub position: String,
    pub industry: String,
    pub field_of_work: String,
    pub connected_on: Option<NaiveDate>,
    pub last_contacted: Option<NaiveDate>,
    pub cadence: Option<Cadence>,
}

impl ContactFields {
    /// Overwrite the attributes named by `changes`. `Overdue` is not a
    /// contact attribute and is ignored here.
    pub fn apply(&mut self, changes: &FieldSet) {
        for change in changes.iter() {
            match change {
                FieldChange::Name(v) => self.name = v.clone(),
                FieldChange::Email(v) => self.email = v.clone(),
                FieldChange::Phone(v) => self.phone = v.clone(),
                FieldChange::Company(v) => self.company = v.clone(),
                FieldChange::Position(v) => self.position = v.clone(),
                FieldChange::Industry(v) => self.industry = v.clone(),
                FieldChange::FieldOfWork(v) => self.field_of_work = v.clone(),
                FieldChange::ConnectedOn(d) => self.connected_on = Some(*d),
                FieldChange::LastContacted(d) => self.last_contacted = Some(*d),
                FieldChange::Cadence(c) => self.cadence = Some(c.clone()),
                FieldChange::Overdue(_) => {}
            }
        }
    }
}

/// A contact as freshly imported, not yet reconciled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Profile URL used to correlate with stored records
    pub match_key: String,
    #[serde(flatten)]
    pub fields: ContactFields,
}

impl CandidateRecord {
    pub fn new(match_key: impl Into<String>, fields: ContactFields) -> Self {
        Self {
            match_key: match_key.into(),
            fields,
        }
    }

    pub fn normalized_key(&self) -> Option<&str> {
        normalize_match_key(&self.match_key)
    }

    /// A candidate is meaningful when any identifying attribute is present.
    pub fn is_meaningful(&self) -> bool {
        [
            self.fields.name.as_str(),
            self.fields.company.as_str(),
            self.fields.position.as_str(),
            self.match_key.as_str(),
        ]
        .iter()
        .any(|v| !v.trim().is_empty())
    }

    /// Human label for progress messages
    pub fn label(&self) -> &str {
        record_label(&self.fields.name, &self.match_key)
    }
}

/// A contact as currently stored remotely
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingRecord {
    pub id: RecordId,
    pub match_key: String,
    #[serde(flatten)]
    pub fields: ContactFields,
    pub overdue: bool,
}

impl ExistingRecord {
    pub fn normalized_key(&self) -> Option<&str> {
        normalize_match_key(&self.match_key)
    }

    pub fn label(&self) -> &str {
        record_label(&self.fields.name, &self.match_key)
    }

    /// Fold a partial update into this snapshot.
    pub fn apply(&mut self, changes: &FieldSet) {
        self.fields.apply(changes);
        if let Some(FieldChange::Overdue(flag)) = changes.get(super::field_set::Field::Overdue) {
            self.overdue = *flag;
        }
    }

    /// Build the stored form of a freshly created candidate
    pub fn from_candidate(id: impl Into<RecordId>, candidate: &CandidateRecord) -> Self {
        Self {
            id: id.into(),
            match_key: candidate.match_key.trim().to_string(),
            fields: candidate.fields.clone(),
            overdue: false,
        }
    }
}

/// Trim a match key; blank keys are "no key".
pub fn normalize_match_key(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Text equality after trimming, ignoring case
pub fn text_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    a == b || a.to_lowercase() == b.to_lowercase()
}

fn record_label<'a>(name: &'a str, match_key: &'a str) -> &'a str {
    let name = name.trim();
    if !name.is_empty() {
        return name;
    }
    let key = match_key.trim();
    if !key.is_empty() {
        key
    } else {
        "Unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_match_key_is_no_key() {
        assert_eq!(normalize_match_key("   "), None);
        assert_eq!(normalize_match_key(" u1 "), Some("u1"));
    }

    #[test]
    fn test_meaningful_requires_identifying_field() {
        let mut candidate = CandidateRecord::default();
        candidate.fields.email = "a@b.c".to_string();
        assert!(!candidate.is_meaningful());

        candidate.fields.position = " Engineer ".to_string();
        assert!(candidate.is_meaningful());
    }

    #[test]
    fn test_text_eq_ignores_case_and_padding() {
        assert!(text_eq("Acme", "acme "));
        assert!(!text_eq("Acme", "Globex"));
    }

    #[test]
    fn test_label_falls_back_to_key() {
        let candidate = CandidateRecord::new("https://x/in/jane", ContactFields::default());
        assert_eq!(candidate.label(), "https://x/in/jane");
        assert_eq!(CandidateRecord::default().label(), "Unknown");
    }
}
