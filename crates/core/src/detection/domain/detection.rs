use serde::Serialize;
use thiserror::Error;

use crate::shared::bounding_box::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "Male"),
            Gender::Female => write!(f, "Female"),
        }
    }
}

/// A malformed detection. Rejected individually; the rest of the batch
/// still goes through.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("age must be a finite non-negative number, got {0}")]
    InvalidAge(f64),
    #[error("bounding box is degenerate: {0:?}")]
    DegenerateBox(BoundingBox),
    #[error("gender confidence must be within [0, 1], got {0}")]
    InvalidConfidence(f64),
}

/// One raw face reading from the analyzer. Not retained past correction.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub age: f64,
    pub gender: Gender,
    pub confidence: f64,
}

impl Detection {
    pub fn new(bbox: BoundingBox, age: f64, gender: Gender, confidence: f64) -> Self {
        Self {
            bbox,
            age,
            gender,
            confidence,
        }
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if !self.age.is_finite() || self.age < 0.0 {
            return Err(InputError::InvalidAge(self.age));
        }
        if self.bbox.is_degenerate() {
            return Err(InputError::DegenerateBox(self.bbox));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(InputError::InvalidConfidence(self.confidence));
        }
        Ok(())
    }
}

/// A validated detection with its age already calibrated.
///
/// Only the bias corrector constructs these, so every instance has a
/// non-negative age, a non-degenerate box and a confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedDetection {
    bbox: BoundingBox,
    age: f64,
    gender: Gender,
    confidence: f64,
}

impl CorrectedDetection {
    pub(crate) fn from_validated(detection: &Detection, age: f64) -> Self {
        Self {
            bbox: detection.bbox,
            age,
            gender: detection.gender,
            confidence: detection.confidence,
        }
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn age(&self) -> f64 {
        self.age
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}
