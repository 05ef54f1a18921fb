use serde::Serialize;

use crate::detection::domain::detection::Gender;
use crate::shared::constants::{AGE_BUCKET_WIDTH, AGE_DECADE_BUCKETS};
use crate::tracking::domain::stable_result::StableResult;

/// Mean/min/max over the stable ages. Absent when there are no tracks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AgeRange {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// One histogram bin, `[lower, upper)`. The overflow bin has no upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AgeBucket {
    pub lower: f64,
    pub upper: Option<f64>,
    pub count: usize,
}

impl AgeBucket {
    pub fn label(&self) -> String {
        match self.upper {
            Some(upper) => format!("{:.0}-{:.0}", self.lower, upper - 1.0),
            None => format!("{:.0}+", self.lower),
        }
    }
}

/// Population summary over the current stable results.
///
/// Recomputed from scratch on every request; holds no state of its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSummary {
    pub count: usize,
    /// `None` is the "no data" marker for an empty population.
    pub ages: Option<AgeRange>,
    pub buckets: Vec<AgeBucket>,
    pub male: usize,
    pub female: usize,
}

impl StatisticsSummary {
    pub fn has_data(&self) -> bool {
        self.ages.is_some()
    }

    /// Count in the bucket containing `age`.
    pub fn bucket_count(&self, age: f64) -> usize {
        self.buckets[bucket_index(age)].count
    }
}

pub fn summarize(results: &[StableResult]) -> StatisticsSummary {
    let mut ages: Vec<f64> = results.iter().map(|r| r.age).collect();
    // Summation order is fixed so the mean does not depend on input order.
    ages.sort_by(f64::total_cmp);

    let mut counts = [0usize; AGE_DECADE_BUCKETS + 1];
    for &age in &ages {
        counts[bucket_index(age)] += 1;
    }

    let range = match (ages.first(), ages.last()) {
        (Some(&min), Some(&max)) => Some(AgeRange {
            mean: ages.iter().sum::<f64>() / ages.len() as f64,
            min,
            max,
        }),
        _ => None,
    };

    let male = results.iter().filter(|r| r.gender == Gender::Male).count();

    StatisticsSummary {
        count: results.len(),
        ages: range,
        buckets: counts
            .iter()
            .enumerate()
            .map(|(k, &count)| AgeBucket {
                lower: k as f64 * AGE_BUCKET_WIDTH,
                upper: (k < AGE_DECADE_BUCKETS).then(|| (k + 1) as f64 * AGE_BUCKET_WIDTH),
                count,
            })
            .collect(),
        male,
        female: results.len() - male,
    }
}

/// `[k*10, (k+1)*10)` for the decade bins; everything at or above the top
/// boundary lands in the overflow bin.
fn bucket_index(age: f64) -> usize {
    let k = (age / AGE_BUCKET_WIDTH).floor();
    if k >= AGE_DECADE_BUCKETS as f64 {
        AGE_DECADE_BUCKETS
    } else {
        k.max(0.0) as usize
    }
}
