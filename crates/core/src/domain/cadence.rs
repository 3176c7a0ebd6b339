// Contact cadence and the day-gap table used to derive staleness

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Desired contact frequency for a record.
///
/// Names are matched case-insensitively after trimming. Anything that is not
/// one of the four well-known schedules is kept verbatim as `Custom` so that
/// it survives a round trip through the store. New contacts default to
/// `Monthly`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Cadence {
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
    Custom(String),
}

impl Cadence {
    /// Parse a cadence name. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let cadence = match trimmed.to_ascii_lowercase().as_str() {
            "weekly" => Cadence::Weekly,
            "monthly" => Cadence::Monthly,
            "quarterly" => Cadence::Quarterly,
            "yearly" | "annually" => Cadence::Yearly,
            _ => Cadence::Custom(trimmed.to_string()),
        };
        Some(cadence)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Cadence::Weekly => "Weekly",
            Cadence::Monthly => "Monthly",
            Cadence::Quarterly => "Quarterly",
            Cadence::Yearly => "Yearly",
            Cadence::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Blank input maps to the default cadence
impl From<String> for Cadence {
    fn from(raw: String) -> Self {
        Cadence::parse(&raw).unwrap_or_default()
    }
}

impl From<Cadence> for String {
    fn from(cadence: Cadence) -> Self {
        cadence.as_str().to_string()
    }
}

/// Maximum allowed day-gap per cadence.
///
/// A cadence missing from the table is never overdue.
#[derive(Debug, Clone)]
pub struct CadenceRules {
    max_gap_days: HashMap<Cadence, i64>,
}

impl CadenceRules {
    pub fn empty() -> Self {
        Self {
            max_gap_days: HashMap::new(),
        }
    }

    pub fn with_rule(mut self, cadence: Cadence, max_gap_days: i64) -> Self {
        self.max_gap_days.insert(cadence, max_gap_days);
        self
    }

    pub fn max_gap_days(&self, cadence: &Cadence) -> Option<i64> {
        self.max_gap_days.get(cadence).copied()
    }
}

impl Default for CadenceRules {
    fn default() -> Self {
        Self::empty()
            .with_rule(Cadence::Weekly, 7)
            .with_rule(Cadence::Monthly, 30)
            .with_rule(Cadence::Quarterly, 90)
            .with_rule(Cadence::Yearly, 365)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive_and_trims() {
        assert_eq!(Cadence::parse("  weekly "), Some(Cadence::Weekly));
        assert_eq!(Cadence::parse("QUARTERLY"), Some(Cadence::Quarterly));
        assert_eq!(Cadence::parse(""), None);
        assert_eq!(
            Cadence::parse("Biweekly"),
            Some(Cadence::Custom("Biweekly".to_string()))
        );
    }

    #[test]
    fn test_default_rules() {
        let rules = CadenceRules::default();
        assert_eq!(rules.max_gap_days(&Cadence::Weekly), Some(7));
        assert_eq!(rules.max_gap_days(&Cadence::Yearly), Some(365));
        assert_eq!(
            rules.max_gap_days(&Cadence::Custom("Biweekly".to_string())),
            None
        );
    }

    #[test]
    fn test_serde_uses_plain_names() {
        let json = serde_json::to_string(&Cadence::Monthly).unwrap();
        assert_eq!(json, "\"Monthly\"");
        let back: Cadence = serde_json::from_str("\"monthly\"").unwrap();
        assert_eq!(back, Cadence::Monthly);
    }

    #[test]
    fn test_blank_name_is_default_cadence() {
        assert_eq!(Cadence::from(String::new()), Cadence::default());
        assert_eq!(Cadence::from("   ".to_string()), Cadence::Monthly);
        let back: Cadence = serde_json::from_str("\"\"").unwrap();
        assert_eq!(back, Cadence::Monthly);
        assert_ne!(back, Cadence::Custom(String::new()));
    }
}
