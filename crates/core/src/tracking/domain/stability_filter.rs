use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// How a track's age history collapses into one stable value.
///
/// Every policy is clamped to the history's range, so a lone observation
/// is reported unchanged and a history of identical values reports exactly
/// that value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingPolicy {
    /// Unweighted mean over the history.
    #[default]
    Mean,
    /// Linear weights `1..=n`, newest observation heaviest.
    RecencyWeighted,
    /// Middle value; mean of the two middle values for even lengths.
    Median,
}

const PREALLOCATED_AGES: usize = 16;

/// Fixed-capacity ring of recent corrected ages, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct AgeHistory {
    ages: VecDeque<f64>,
    capacity: usize,
}

impl AgeHistory {
    /// `capacity` is raised to 1 if zero; configuration rejects zero earlier.
    /// Storage grows with pushes up to `capacity`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ages: VecDeque::with_capacity(capacity.min(PREALLOCATED_AGES)),
            capacity,
        }
    }

    pub fn push(&mut self, age: f64) {
        if self.ages.len() == self.capacity {
            self.ages.pop_front();
        }
        self.ages.push_back(age);
    }

    pub fn len(&self) -> usize {
        self.ages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ages.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ages.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.ages.iter().copied()
    }

    fn range(&self) -> Option<(f64, f64)> {
        let mut iter = self.iter();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), a| (lo.min(a), hi.max(a))))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StabilityFilter {
    policy: SmoothingPolicy,
}

impl StabilityFilter {
    pub fn new(policy: SmoothingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SmoothingPolicy {
        self.policy
    }

    /// Records `age` (evicting the oldest entry at capacity) and returns the
    /// recomputed stable age.
    pub fn update(&self, history: &mut AgeHistory, age: f64) -> f64 {
        history.push(age);
        self.stable_age(history).unwrap_or(age)
    }

    /// Stable age derived solely from `history`; `None` when it is empty.
    pub fn stable_age(&self, history: &AgeHistory) -> Option<f64> {
        let (lo, hi) = history.range()?;
        let raw = match self.policy {
            SmoothingPolicy::Mean => mean(history),
            SmoothingPolicy::RecencyWeighted => recency_weighted(history),
            SmoothingPolicy::Median => median(history),
        };
        Some(raw.clamp(lo, hi))
    }
}

fn mean(history: &AgeHistory) -> f64 {
    history.iter().sum::<f64>() / history.len() as f64
}

fn recency_weighted(history: &AgeHistory) -> f64 {
    let (weighted, total) = history
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sum, weights), (i, age)| {
            let w = (i + 1) as f64;
            (sum + w * age, weights + w)
        });
    weighted / total
}

fn median(history: &AgeHistory) -> f64 {
    let mut sorted: Vec<f64> = history.iter().collect();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
