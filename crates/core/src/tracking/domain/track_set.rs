use crate::detection::domain::detection::CorrectedDetection;
use crate::shared::config::EngineConfig;

use super::stability_filter::StabilityFilter;
use super::stable_result::StableResult;
use super::track::{Track, TrackId, TrackPolicy};
use super::track_matcher::TrackMatcher;

/// What one submission did to the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackUpdate {
    pub sequence: u64,
    pub matched: Vec<TrackId>,
    pub created: Vec<TrackId>,
    pub retired: Vec<TrackId>,
    /// Live tracks after the update.
    pub active: usize,
}

/// All live tracks plus the counters that keep identities unique.
///
/// Owned by the caller and mutated only through [`TrackSet::update`]; one
/// call is one full matching pass. Tracks are kept in ascending id order.
#[derive(Debug, Clone)]
pub struct TrackSet {
    tracks: Vec<Track>,
    next_id: u64,
    sequence: u64,
    matcher: TrackMatcher,
    policy: TrackPolicy,
    max_missed: u32,
}

impl TrackSet {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            sequence: 0,
            matcher: TrackMatcher::new(config.min_iou),
            policy: TrackPolicy {
                history_capacity: config.history_capacity,
                gender_override_confidence: config.gender_override_confidence,
                filter: StabilityFilter::new(config.smoothing),
            },
            max_missed: config.max_missed,
        }
    }

    pub fn update(&mut self, detections: &[CorrectedDetection]) -> TrackUpdate {
        self.sequence += 1;
        let sequence = self.sequence;
        let assignment = self.matcher.assign(detections, &self.tracks);

        let mut update = TrackUpdate {
            sequence,
            ..Default::default()
        };

        for &(ti, di) in &assignment.matches {
            self.tracks[ti].observe(&detections[di], sequence, &self.policy);
            update.matched.push(self.tracks[ti].id());
        }
        for &ti in &assignment.unmatched_tracks {
            self.tracks[ti].mark_missed();
        }

        let max_missed = self.max_missed;
        self.tracks.retain(|t| {
            let keep = t.missed() <= max_missed;
            if !keep {
                update.retired.push(t.id());
            }
            keep
        });

        for &di in &assignment.unmatched_detections {
            let id = TrackId(self.next_id);
            self.next_id += 1;
            self.tracks
                .push(Track::start(id, &detections[di], sequence, &self.policy));
            update.created.push(id);
        }

        update.matched.sort();
        update.active = self.tracks.len();
        update
    }

    pub fn results(&self) -> Vec<StableResult> {
        self.tracks
            .iter()
            .map(|t| StableResult::from_track(t, self.sequence))
            .collect()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Number of completed submissions.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}
