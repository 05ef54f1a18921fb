/// Greedy IoU association between one submission's detections and the
/// live tracks.
///
/// Candidate pairs are ranked by IoU (descending), then by track id and
/// detection index (ascending) so equal scores resolve the same way every
/// run. Each track and each detection is used at most once. This is not an
/// optimal bipartite assignment; per-image face counts are small enough
/// that the greedy pass is preferred for its predictability.
use crate::detection::domain::detection::CorrectedDetection;
use crate::shared::constants::DEFAULT_MIN_IOU;

use super::track::Track;

/// Result of one matching round, expressed as indices into the slices that
/// were passed to [`TrackMatcher::assign`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    /// `(track_index, detection_index)` pairs, in the order they were accepted.
    pub matches: Vec<(usize, usize)>,
    pub unmatched_detections: Vec<usize>,
    pub unmatched_tracks: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct TrackMatcher {
    min_iou: f64,
}

impl TrackMatcher {
    pub fn new(min_iou: f64) -> Self {
        Self { min_iou }
    }

    pub fn min_iou(&self) -> f64 {
        self.min_iou
    }

    pub fn assign(&self, detections: &[CorrectedDetection], tracks: &[Track]) -> Assignment {
        let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
        for (ti, track) in tracks.iter().enumerate() {
            for (di, det) in detections.iter().enumerate() {
                let score = track.bbox().iou(det.bbox());
                if score > 0.0 && score >= self.min_iou {
                    pairs.push((ti, di, score));
                }
            }
        }
        pairs.sort_by(|a, b| {
            b.2.total_cmp(&a.2)
                .then_with(|| tracks[a.0].id().cmp(&tracks[b.0].id()))
                .then_with(|| a.1.cmp(&b.1))
        });

        let mut track_used = vec![false; tracks.len()];
        let mut det_used = vec![false; detections.len()];
        let mut matches = Vec::new();

        for (ti, di, _) in pairs {
            if !track_used[ti] && !det_used[di] {
                track_used[ti] = true;
                det_used[di] = true;
                matches.push((ti, di));
            }
        }

        Assignment {
            matches,
            unmatched_detections: unused(&det_used),
            unmatched_tracks: unused(&track_used),
        }
    }
}

impl Default for TrackMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_IOU)
    }
}

fn unused(flags: &[bool]) -> Vec<usize> {
    flags
        .iter()
        .enumerate()
        .filter(|(_, used)| !**used)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::{Detection, Gender};
    use crate::shared::bounding_box::BoundingBox;
    use crate::tracking::domain::bias_corrector::BiasCorrector;
    use crate::tracking::domain::stability_filter::StabilityFilter;
    use crate::tracking::domain::track::{TrackId, TrackPolicy};

    fn det(x: f64, y: f64, w: f64, h: f64) -> CorrectedDetection {
        let raw = Detection::new(BoundingBox::new(x, y, w, h), 30.0, Gender::Male, 0.9);
        BiasCorrector::default().correct(&raw).unwrap()
    }

    fn track(id: u64, x: f64, y: f64, w: f64, h: f64) -> Track {
        let policy = TrackPolicy {
            history_capacity: 5,
            gender_override_confidence: 0.8,
            filter: StabilityFilter::default(),
        };
        Track::start(TrackId(id), &det(x, y, w, h), 0, &policy)
    }

    #[test]
    fn test_empty_detections_miss_every_track() {
        let tracks = vec![track(1, 0.0, 0.0, 50.0, 50.0), track(2, 100.0, 0.0, 50.0, 50.0)];
        let a = TrackMatcher::default().assign(&[], &tracks);
        assert!(a.matches.is_empty());
        assert!(a.unmatched_detections.is_empty());
        assert_eq!(a.unmatched_tracks, vec![0, 1]);
    }

    #[test]
    fn test_empty_tracks_make_every_detection_new() {
        let dets = vec![det(0.0, 0.0, 50.0, 50.0), det(100.0, 0.0, 50.0, 50.0)];
        let a = TrackMatcher::default().assign(&dets, &[]);
        assert!(a.matches.is_empty());
        assert_eq!(a.unmatched_detections, vec![0, 1]);
        assert!(a.unmatched_tracks.is_empty());
    }

    #[test]
    fn test_identical_box_matches() {
        let tracks = vec![track(1, 10.0, 10.0, 50.0, 50.0)];
        let a = TrackMatcher::default().assign(&[det(10.0, 10.0, 50.0, 50.0)], &tracks);
        assert_eq!(a.matches, vec![(0, 0)]);
    }

    #[test]
    fn test_below_threshold_does_not_match() {
        // IoU = 5000 / 15000 ≈ 0.333
        let tracks = vec![track(1, 0.0, 0.0, 100.0, 100.0)];
        let dets = vec![det(50.0, 0.0, 100.0, 100.0)];

        assert_eq!(TrackMatcher::new(0.3).assign(&dets, &tracks).matches.len(), 1);

        let strict = TrackMatcher::new(0.5).assign(&dets, &tracks);
        assert!(strict.matches.is_empty());
        assert_eq!(strict.unmatched_detections, vec![0]);
        assert_eq!(strict.unmatched_tracks, vec![0]);
    }

    #[test]
    fn test_highest_overlap_wins() {
        let tracks = vec![
            track(1, 0.0, 0.0, 100.0, 100.0),
            track(2, 20.0, 0.0, 100.0, 100.0),
        ];
        // Exactly on track 2.
        let a = TrackMatcher::default().assign(&[det(20.0, 0.0, 100.0, 100.0)], &tracks);
        assert_eq!(a.matches, vec![(1, 0)]);
        assert_eq!(a.unmatched_tracks, vec![0]);
    }

    #[test]
    fn test_each_track_receives_at_most_one_detection() {
        let tracks = vec![track(1, 0.0, 0.0, 100.0, 100.0)];
        let dets = vec![det(0.0, 0.0, 100.0, 100.0), det(5.0, 5.0, 100.0, 100.0)];
        let a = TrackMatcher::default().assign(&dets, &tracks);
        assert_eq!(a.matches, vec![(0, 0)]);
        assert_eq!(a.unmatched_detections, vec![1]);
    }

    #[test]
    fn test_tie_broken_by_smaller_track_id() {
        // Both tracks sit on the same box; the detection overlaps them equally.
        // Track order in the slice is deliberately reversed.
        let tracks = vec![track(9, 0.0, 0.0, 60.0, 60.0), track(4, 0.0, 0.0, 60.0, 60.0)];
        let a = TrackMatcher::default().assign(&[det(0.0, 0.0, 60.0, 60.0)], &tracks);
        assert_eq!(a.matches, vec![(1, 0)]);
        assert_eq!(a.unmatched_tracks, vec![0]);
    }

    #[test]
    fn test_tie_between_detections_broken_by_index() {
        let tracks = vec![track(1, 0.0, 0.0, 60.0, 60.0)];
        let dets = vec![det(0.0, 0.0, 60.0, 60.0), det(0.0, 0.0, 60.0, 60.0)];
        let a = TrackMatcher::default().assign(&dets, &tracks);
        assert_eq!(a.matches, vec![(0, 0)]);
        assert_eq!(a.unmatched_detections, vec![1]);
    }

    #[test]
    fn test_independent_faces_keep_their_tracks() {
        let tracks = vec![
            track(1, 0.0, 0.0, 50.0, 50.0),
            track(2, 200.0, 200.0, 50.0, 50.0),
        ];
        let dets = vec![det(202.0, 202.0, 50.0, 50.0), det(2.0, 2.0, 50.0, 50.0)];
        let mut a = TrackMatcher::default().assign(&dets, &tracks);
        a.matches.sort();
        assert_eq!(a.matches, vec![(0, 1), (1, 0)]);
    }
}
