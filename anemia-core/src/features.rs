//! The five blood-test features and input validation.

use std::fmt;

use ndarray::Array1;

use crate::error::ValidationError;

/// Number of features every request carries.
pub const N_FEATURES: usize = 5;

/// One blood-test measurement, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Hemoglobin.
    Hb,
    /// Red blood cell count.
    Rbc,
    /// Packed cell volume (hematocrit).
    Pcv,
    /// Mean corpuscular hemoglobin.
    Mch,
    /// Mean corpuscular hemoglobin concentration.
    Mchc,
}

impl Feature {
    /// All features in the order the classifier expects them.
    pub const ALL: [Feature; N_FEATURES] = [
        Feature::Hb,
        Feature::Rbc,
        Feature::Pcv,
        Feature::Mch,
        Feature::Mchc,
    ];

    pub fn index(self) -> usize {
        match self {
            Feature::Hb => 0,
            Feature::Rbc => 1,
            Feature::Pcv => 2,
            Feature::Mch => 3,
            Feature::Mchc => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Feature::Hb => "HB",
            Feature::Rbc => "RBC",
            Feature::Pcv => "PCV",
            Feature::Mch => "MCH",
            Feature::Mchc => "MCHC",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Feature::Hb => "g/dL",
            Feature::Rbc => "10^6/uL",
            Feature::Pcv => "%",
            Feature::Mch => "pg",
            Feature::Mchc => "g/dL",
        }
    }

    /// Typical adult range, shown to users as a hint. Never enforced.
    pub fn typical_range(self) -> (f64, f64) {
        match self {
            Feature::Hb => (12.0, 17.5),
            Feature::Rbc => (4.0, 6.0),
            Feature::Pcv => (36.0, 52.0),
            Feature::Mch => (27.0, 33.0),
            Feature::Mchc => (32.0, 36.0),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully populated, validated request.
///
/// The only way to obtain one is [`validate`], so holding a `FeatureVector`
/// means every value is finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; N_FEATURES],
}

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn values(&self) -> &[f64; N_FEATURES] {
        &self.values
    }

    pub fn to_array(&self) -> Array1<f64> {
        Array1::from(self.values.to_vec())
    }
}

impl TryFrom<&[f64]> for FeatureVector {
    type Error = ValidationError;

    fn try_from(raw: &[f64]) -> Result<Self, Self::Error> {
        validate(raw)
    }
}

/// Validate raw positional inputs `HB, RBC, PCV, MCH, MCHC`.
///
/// A missing input is represented as NaN. Checks run in order: arity, then
/// missing fields (all of them are reported), then the domain check which
/// reports the first negative or infinite value.
pub fn validate(raw: &[f64]) -> Result<FeatureVector, ValidationError> {
    if raw.len() != N_FEATURES {
        return Err(ValidationError::WrongArity {
            expected: N_FEATURES,
            actual: raw.len(),
        });
    }

    let missing: Vec<Feature> = Feature::ALL
        .iter()
        .copied()
        .filter(|f| raw[f.index()].is_nan())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::Incomplete { missing });
    }

    if let Some(field) = Feature::ALL
        .iter()
        .copied()
        .find(|f| !(raw[f.index()].is_finite() && raw[f.index()] >= 0.0))
    {
        return Err(ValidationError::OutOfDomain {
            field,
            value: raw[field.index()],
        });
    }

    let mut values = [0.0; N_FEATURES];
    values.copy_from_slice(raw);
    Ok(FeatureVector { values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_complete_input() {
        let fv = validate(&[13.0, 4.5, 40.0, 28.0, 33.0]).unwrap();
        assert_eq!(fv.get(Feature::Hb), 13.0);
        assert_eq!(fv.get(Feature::Mchc), 33.0);
        assert_eq!(fv.to_array().len(), N_FEATURES);
    }

    #[test]
    fn rejects_wrong_arity() {
        assert_eq!(
            validate(&[13.0, 4.5, 40.0, 28.0]),
            Err(ValidationError::WrongArity { expected: 5, actual: 4 })
        );
        assert_eq!(
            validate(&[13.0, 4.5, 40.0, 28.0, 33.0, 1.0]),
            Err(ValidationError::WrongArity { expected: 5, actual: 6 })
        );
        assert!(validate(&[]).is_err());
    }

    #[test]
    fn negative_hb_is_out_of_domain() {
        assert_eq!(
            validate(&[-1.0, 13.0, 40.0, 30.0, 33.0]),
            Err(ValidationError::OutOfDomain {
                field: Feature::Hb,
                value: -1.0
            })
        );
    }

    #[test]
    fn nan_is_incomplete() {
        assert_eq!(
            validate(&[f64::NAN, 13.0, 40.0, 30.0, 33.0]),
            Err(ValidationError::Incomplete {
                missing: vec![Feature::Hb]
            })
        );
    }

    #[test]
    fn incomplete_reports_every_missing_field_before_domain() {
        assert_eq!(
            validate(&[-1.0, f64::NAN, 40.0, f64::NAN, 33.0]),
            Err(ValidationError::Incomplete {
                missing: vec![Feature::Rbc, Feature::Mch]
            })
        );
    }

    #[test]
    fn infinity_is_out_of_domain() {
        assert!(matches!(
            validate(&[13.0, 4.5, f64::INFINITY, 28.0, 33.0]),
            Err(ValidationError::OutOfDomain {
                field: Feature::Pcv,
                ..
            })
        ));
    }

    #[test]
    fn zero_and_implausible_values_pass() {
        assert!(validate(&[0.0, 0.0, 0.0, 0.0, 0.0]).is_ok());
        assert!(validate(&[-0.0, 1e6, 400.0, 90.0, 99.0]).is_ok());
    }
}
