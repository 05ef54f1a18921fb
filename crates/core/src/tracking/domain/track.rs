use serde::Serialize;

use crate::detection::domain::detection::{CorrectedDetection, Gender};
use crate::shared::bounding_box::BoundingBox;

use super::stability_filter::{AgeHistory, StabilityFilter};

/// Identity of one physical face. Issued once, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Person {}", self.0)
    }
}

/// Per-track tunables shared by every track in a set.
#[derive(Debug, Clone, Copy)]
pub struct TrackPolicy {
    pub history_capacity: usize,
    pub gender_override_confidence: f64,
    pub filter: StabilityFilter,
}

/// One face followed across submissions.
#[derive(Debug, Clone)]
pub struct Track {
    id: TrackId,
    bbox: BoundingBox,
    history: AgeHistory,
    stable_age: f64,
    gender: Gender,
    gender_confidence: f64,
    first_seen: u64,
    last_seen: u64,
    missed: u32,
    observations: u64,
}

impl Track {
    pub(crate) fn start(
        id: TrackId,
        detection: &CorrectedDetection,
        sequence: u64,
        policy: &TrackPolicy,
    ) -> Self {
        let mut history = AgeHistory::new(policy.history_capacity);
        let stable_age = policy.filter.update(&mut history, detection.age());
        Self {
            id,
            bbox: *detection.bbox(),
            history,
            stable_age,
            gender: detection.gender(),
            gender_confidence: detection.confidence(),
            first_seen: sequence,
            last_seen: sequence,
            missed: 0,
            observations: 1,
        }
    }

    pub(crate) fn observe(
        &mut self,
        detection: &CorrectedDetection,
        sequence: u64,
        policy: &TrackPolicy,
    ) {
        self.bbox = *detection.bbox();
        self.stable_age = policy.filter.update(&mut self.history, detection.age());
        self.apply_gender(
            detection.gender(),
            detection.confidence(),
            policy.gender_override_confidence,
        );
        self.last_seen = sequence;
        self.missed = 0;
        self.observations += 1;
    }

    pub(crate) fn mark_missed(&mut self) {
        self.missed = self.missed.saturating_add(1);
    }

    /// The first reading sets the label; a conflicting one only replaces it
    /// when its confidence is strictly above `override_threshold`.
    fn apply_gender(&mut self, gender: Gender, confidence: f64, override_threshold: f64) {
        if gender == self.gender {
            self.gender_confidence = self.gender_confidence.max(confidence);
        } else if confidence > override_threshold {
            self.gender = gender;
            self.gender_confidence = confidence;
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn history(&self) -> &AgeHistory {
        &self.history
    }

    pub fn stable_age(&self) -> f64 {
        self.stable_age
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn gender_confidence(&self) -> f64 {
        self.gender_confidence
    }

    pub fn first_seen(&self) -> u64 {
        self.first_seen
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    pub fn missed(&self) -> u32 {
        self.missed
    }

    pub fn observations(&self) -> u64 {
        self.observations
    }

    /// History has filled up; before that the reading is still settling.
    pub fn is_stable(&self) -> bool {
        self.history.is_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::Detection;
    use crate::tracking::domain::bias_corrector::BiasCorrector;
    use approx::assert_relative_eq;

    fn policy() -> TrackPolicy {
        TrackPolicy {
            history_capacity: 5,
            gender_override_confidence: 0.8,
            filter: StabilityFilter::default(),
        }
    }

    fn corrected(age: f64, gender: Gender, confidence: f64) -> CorrectedDetection {
        let raw = Detection::new(BoundingBox::new(0.0, 0.0, 50.0, 50.0), age, gender, confidence);
        BiasCorrector::new(0.0).correct(&raw).unwrap()
    }

    #[test]
    fn test_start_reports_first_observation() {
        let t = Track::start(TrackId(7), &corrected(31.0, Gender::Male, 0.6), 3, &policy());
        assert_eq!(t.id(), TrackId(7));
        assert_eq!(t.stable_age(), 31.0);
        assert_eq!(t.gender(), Gender::Male);
        assert_eq!(t.first_seen(), 3);
        assert_eq!(t.last_seen(), 3);
        assert_eq!(t.missed(), 0);
        assert_eq!(t.history().len(), 1);
        assert!(!t.is_stable());
    }

    #[test]
    fn test_observe_resets_miss_counter() {
        let p = policy();
        let mut t = Track::start(TrackId(1), &corrected(30.0, Gender::Male, 0.9), 1, &p);
        t.mark_missed();
        t.mark_missed();
        assert_eq!(t.missed(), 2);

        t.observe(&corrected(32.0, Gender::Male, 0.9), 4, &p);

        assert_eq!(t.missed(), 0);
        assert_eq!(t.last_seen(), 4);
        assert_eq!(t.observations(), 2);
        assert_relative_eq!(t.stable_age(), 31.0);
    }

    #[test]
    fn test_becomes_stable_when_history_full() {
        let p = policy();
        let mut t = Track::start(TrackId(1), &corrected(30.0, Gender::Male, 0.9), 1, &p);
        for seq in 2..=5 {
            t.observe(&corrected(30.0, Gender::Male, 0.9), seq, &p);
        }
        assert!(t.is_stable());
    }

    // ── Sticky gender ────────────────────────────────────────────────

    #[test]
    fn test_high_confidence_overrides_then_low_confidence_does_not_revert() {
        let p = policy();
        let mut t = Track::start(TrackId(1), &corrected(25.0, Gender::Female, 0.4), 1, &p);
        assert_eq!(t.gender(), Gender::Female);

        t.observe(&corrected(25.0, Gender::Male, 0.9), 2, &p);
        assert_eq!(t.gender(), Gender::Male);

        t.observe(&corrected(25.0, Gender::Female, 0.5), 3, &p);
        assert_eq!(t.gender(), Gender::Male);
        assert_relative_eq!(t.gender_confidence(), 0.9);
    }

    #[test]
    fn test_confidence_equal_to_threshold_does_not_override() {
        let p = policy();
        let mut t = Track::start(TrackId(1), &corrected(25.0, Gender::Female, 0.4), 1, &p);
        t.observe(&corrected(25.0, Gender::Male, 0.8), 2, &p);
        assert_eq!(t.gender(), Gender::Female);
    }

    #[test]
    fn test_agreeing_observation_raises_confidence() {
        let p = policy();
        let mut t = Track::start(TrackId(1), &corrected(25.0, Gender::Female, 0.4), 1, &p);
        t.observe(&corrected(25.0, Gender::Female, 0.7), 2, &p);
        assert_relative_eq!(t.gender_confidence(), 0.7);
    }

    #[test]
    fn test_track_id_display() {
        assert_eq!(TrackId(3).to_string(), "Person 3");
    }
}
