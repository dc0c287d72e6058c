//! Lab-value feature vector for liver-disease screening.
//!
//! Nine ordered values: age plus eight liver-function measurements, matching
//! the column order the classifier artifact was exported with.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Number of features the classifier consumes.
pub const FEATURE_COUNT: usize = 9;

/// Form field names in model order.
///
/// The spellings (including `Alkaline_Phosphotase` and `Total_Protiens`) are
/// the column names of the training data and must not be corrected.
pub const FEATURE_FIELDS: [&str; FEATURE_COUNT] = [
    "Age",
    "Total_Bilirubin",
    "Direct_Bilirubin",
    "Alkaline_Phosphotase",
    "Alanine_Aminotransferase",
    "Aspartate_Aminotransferase",
    "Total_Protiens",
    "Albumin",
    "Albumin_and_Globulin_Ratio",
];

/// Lab values submitted by a patient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct LiverFeatures {
    /// Age in years
    pub age: f64,

    /// Total bilirubin, mg/dL
    pub total_bilirubin: f64,

    /// Direct (conjugated) bilirubin, mg/dL
    pub direct_bilirubin: f64,

    /// Alkaline phosphatase, IU/L
    pub alkaline_phosphotase: f64,

    /// ALT (SGPT), IU/L
    pub alanine_aminotransferase: f64,

    /// AST (SGOT), IU/L
    pub aspartate_aminotransferase: f64,

    /// Total proteins, g/dL
    pub total_proteins: f64,

    /// Albumin, g/dL
    pub albumin: f64,

    /// Albumin / globulin ratio
    pub albumin_globulin_ratio: f64,
}

impl LiverFeatures {
    /// Convert features to a fixed-size array in model order.
    #[must_use]
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.age,
            self.total_bilirubin,
            self.direct_bilirubin,
            self.alkaline_phosphotase,
            self.alanine_aminotransferase,
            self.aspartate_aminotransferase,
            self.total_proteins,
            self.albumin,
            self.albumin_globulin_ratio,
        ]
    }

    /// Create features from a slice in model order.
    ///
    /// # Errors
    /// Returns error if the slice length is not 9.
    pub fn from_slice(v: &[f64]) -> Result<Self, String> {
        if v.len() != FEATURE_COUNT {
            return Err(format!(
                "Expected {FEATURE_COUNT} features, got {}",
                v.len()
            ));
        }

        Ok(Self {
            age: v[0],
            total_bilirubin: v[1],
            direct_bilirubin: v[2],
            alkaline_phosphotase: v[3],
            alanine_aminotransferase: v[4],
            aspartate_aminotransferase: v[5],
            total_proteins: v[6],
            albumin: v[7],
            albumin_globulin_ratio: v[8],
        })
    }

    /// Parse submitted form fields.
    ///
    /// A field that is absent counts as `0`. A field that is present must
    /// parse as a finite floating-point number after trimming. Values are
    /// not range checked.
    ///
    /// # Errors
    /// Returns the name of the first field that failed to parse.
    pub fn from_form(form: &HashMap<String, String>) -> Result<Self, String> {
        let mut values = [0.0_f64; FEATURE_COUNT];

        for (slot, field) in values.iter_mut().zip(FEATURE_FIELDS) {
            let Some(raw) = form.get(field) else {
                continue;
            };
            let parsed: f64 = raw.trim().parse().map_err(|_| field.to_string())?;
            if !parsed.is_finite() {
                return Err(field.to_string());
            }
            *slot = parsed;
        }

        Self::from_slice(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn full_form() -> HashMap<String, String> {
        let values = ["45", "1.2", "0.3", "200", "30", "25", "6.5", "3.2", "0.8"];
        FEATURE_FIELDS
            .iter()
            .zip(values)
            .map(|(k, v)| ((*k).to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_form_keeps_field_order() {
        let features = LiverFeatures::from_form(&full_form()).expect("Should parse");
        assert_eq!(
            features.to_array(),
            [45.0, 1.2, 0.3, 200.0, 30.0, 25.0, 6.5, 3.2, 0.8]
        );
    }

    #[test]
    fn test_from_form_rejects_non_numeric() {
        let mut f = full_form();
        f.insert("Age".into(), "abc".into());
        assert_eq!(LiverFeatures::from_form(&f), Err("Age".to_string()));
    }

    #[test]
    fn test_from_form_rejects_empty_and_non_finite() {
        let mut f = full_form();
        f.insert("Albumin".into(), "   ".into());
        assert_eq!(LiverFeatures::from_form(&f), Err("Albumin".to_string()));

        let mut f = full_form();
        f.insert("Total_Bilirubin".into(), "NaN".into());
        assert_eq!(
            LiverFeatures::from_form(&f),
            Err("Total_Bilirubin".to_string())
        );
    }

    #[test]
    fn test_from_form_missing_field_defaults_to_zero() {
        let features =
            LiverFeatures::from_form(&form(&[("Age", " 60 ")])).expect("Should parse");
        assert!((features.age - 60.0).abs() < f64::EPSILON);
        assert_eq!(features.albumin, 0.0);
    }

    #[test]
    fn test_from_slice_length() {
        assert!(LiverFeatures::from_slice(&[1.0; 8]).is_err());
        assert!(LiverFeatures::from_slice(&[1.0; 9]).is_ok());
    }
}
