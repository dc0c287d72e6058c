//! Prediction records kept in the history ledger.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::features::LiverFeatures;

/// Binary classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PredictionLabel {
    /// No liver disease indicated
    Healthy,
    /// Liver disease indicated
    Disease,
}

impl PredictionLabel {
    /// Get the message shown to the patient.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Healthy => "No liver disease detected. Stay healthy.",
            Self::Disease => "You have liver disease. Consult a doctor!",
        }
    }

    /// Numeric form (0 or 1), as stored and reported.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Disease => 1,
        }
    }
}

impl From<PredictionLabel> for u8 {
    fn from(label: PredictionLabel) -> Self {
        label.as_u8()
    }
}

impl TryFrom<u8> for PredictionLabel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Healthy),
            1 => Ok(Self::Disease),
            other => Err(format!("Prediction label must be 0 or 1, got {other}")),
        }
    }
}

impl std::fmt::Display for PredictionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// One form submission and its classification.
///
/// Records are immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Local calendar date of the submission (serialized as `YYYY-MM-DD`)
    pub date: NaiveDate,

    /// Phone of the submitting patient
    pub phone: String,

    /// Name of the submitting patient at submission time
    pub name: String,

    /// Submitted lab values
    pub features: LiverFeatures,

    /// Classifier output
    pub prediction: PredictionLabel,
}

impl PredictionRecord {
    /// Create a record dated today (local time).
    #[must_use]
    pub fn today(
        phone: impl Into<String>,
        name: impl Into<String>,
        features: LiverFeatures,
        prediction: PredictionLabel,
    ) -> Self {
        Self {
            date: chrono::Local::now().date_naive(),
            phone: phone.into(),
            name: name.into(),
            features,
            prediction,
        }
    }
}

/// Records sharing one submission date.
#[derive(Debug, Clone, Serialize)]
pub struct DateGroup {
    pub date: NaiveDate,
    pub records: Vec<PredictionRecord>,
}

/// Group records by date, newest date first.
///
/// Records inside a group keep their ledger order. This is a pure read-side
/// projection recomputed on every view.
#[must_use]
pub fn group_by_date(records: &[PredictionRecord]) -> Vec<DateGroup> {
    let mut by_date: std::collections::BTreeMap<NaiveDate, Vec<PredictionRecord>> =
        std::collections::BTreeMap::new();
    for record in records {
        by_date.entry(record.date).or_default().push(record.clone());
    }

    by_date
        .into_iter()
        .rev()
        .map(|(date, records)| DateGroup { date, records })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str, phone: &str) -> PredictionRecord {
        PredictionRecord {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("Valid date"),
            phone: phone.to_string(),
            name: "Test".to_string(),
            features: LiverFeatures::default(),
            prediction: PredictionLabel::Healthy,
        }
    }

    #[test]
    fn test_label_serializes_as_number() {
        let json = serde_json::to_string(&PredictionLabel::Disease).expect("Should serialize");
        assert_eq!(json, "1");
        let back: PredictionLabel = serde_json::from_str("0").expect("Should deserialize");
        assert_eq!(back, PredictionLabel::Healthy);
        assert!(serde_json::from_str::<PredictionLabel>("2").is_err());
    }

    #[test]
    fn test_record_date_format() {
        let json = serde_json::to_value(record("2024-03-09", "1")).expect("Should serialize");
        assert_eq!(json["date"], "2024-03-09");
    }

    #[test]
    fn test_group_by_date_sorts_descending() {
        let records = vec![
            record("2024-01-02", "a"),
            record("2024-01-05", "b"),
            record("2024-01-02", "c"),
            record("2023-12-31", "d"),
        ];

        let groups = group_by_date(&records);
        let dates: Vec<String> = groups.iter().map(|g| g.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-05", "2024-01-02", "2023-12-31"]);

        let phones: Vec<&str> = groups[1].records.iter().map(|r| r.phone.as_str()).collect();
        assert_eq!(phones, vec!["a", "c"]);
    }

    #[test]
    fn test_group_by_date_empty() {
        assert!(group_by_date(&[]).is_empty());
    }
}
