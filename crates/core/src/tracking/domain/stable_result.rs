use serde::Serialize;

use crate::detection::domain::detection::Gender;
use crate::shared::bounding_box::BoundingBox;

use super::track::{Track, TrackId};

/// Read-only view of a track as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StableResult {
    pub id: TrackId,
    pub age: f64,
    pub gender: Gender,
    pub bbox: BoundingBox,
    pub sample_count: usize,
    pub is_stable: bool,
    /// Matched or created by the most recent submission.
    pub seen_this_submission: bool,
}

impl StableResult {
    pub fn from_track(track: &Track, sequence: u64) -> Self {
        Self {
            id: track.id(),
            age: track.stable_age(),
            gender: track.gender(),
            bbox: *track.bbox(),
            sample_count: track.history().len(),
            is_stable: track.is_stable(),
            seen_this_submission: track.last_seen() == sequence,
        }
    }
}
