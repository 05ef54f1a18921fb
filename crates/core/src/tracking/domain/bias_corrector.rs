use crate::detection::domain::detection::{CorrectedDetection, Detection, InputError};
use crate::shared::constants::DEFAULT_AGE_OFFSET;

/// Removes the model's systematic over-estimate from raw ages.
///
/// `corrected = max(0, raw - offset)`
#[derive(Debug, Clone, Copy)]
pub struct BiasCorrector {
    offset: f64,
}

impl BiasCorrector {
    pub fn new(offset: f64) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn correct(&self, detection: &Detection) -> Result<CorrectedDetection, InputError> {
        detection.validate()?;
        let age = (detection.age - self.offset).max(0.0);
        Ok(CorrectedDetection::from_validated(detection, age))
    }
}

impl Default for BiasCorrector {
    fn default() -> Self {
        Self::new(DEFAULT_AGE_OFFSET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::Gender;
    use crate::shared::bounding_box::BoundingBox;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn raw(age: f64) -> Detection {
        Detection::new(BoundingBox::new(10.0, 10.0, 40.0, 40.0), age, Gender::Female, 0.7)
    }

    #[rstest]
    #[case(4.0, 0.0)]
    #[case(4.5, 0.5)]
    #[case(24.0, 20.0)]
    #[case(87.25, 83.25)]
    fn test_subtracts_offset(#[case] age: f64, #[case] expected: f64) {
        let corrected = BiasCorrector::default().correct(&raw(age)).unwrap();
        assert_relative_eq!(corrected.age(), expected);
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    #[case(3.999)]
    fn test_floors_at_zero(#[case] age: f64) {
        let corrected = BiasCorrector::default().correct(&raw(age)).unwrap();
        assert_eq!(corrected.age(), 0.0);
    }

    #[test]
    fn test_preserves_other_fields() {
        let d = raw(30.0);
        let corrected = BiasCorrector::new(2.0).correct(&d).unwrap();
        assert_eq!(corrected.bbox(), &d.bbox);
        assert_eq!(corrected.gender(), Gender::Female);
        assert_relative_eq!(corrected.confidence(), 0.7);
        assert_relative_eq!(corrected.age(), 28.0);
    }

    #[test]
    fn test_zero_offset_is_identity() {
        let corrected = BiasCorrector::new(0.0).correct(&raw(33.0)).unwrap();
        assert_relative_eq!(corrected.age(), 33.0);
    }

    #[rstest]
    #[case(-0.5)]
    #[case(f64::NAN)]
    #[case(f64::NEG_INFINITY)]
    fn test_rejects_invalid_age(#[case] age: f64) {
        let result = BiasCorrector::default().correct(&raw(age));
        assert!(matches!(result, Err(InputError::InvalidAge(_))));
    }

    #[test]
    fn test_default_offset() {
        assert_relative_eq!(BiasCorrector::default().offset(), 4.0);
    }
}
