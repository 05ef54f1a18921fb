use std::collections::BTreeMap;

use crate::tracking::domain::track_set::TrackUpdate;

/// Observer for analysis-session events.
///
/// Keeps the use case free of any particular output mechanism; the CLI
/// routes through `log`, tests discard everything.
pub trait SessionLogger: Send {
    /// One submission completed and was applied to the track set.
    fn submission(&mut self, update: &TrackUpdate, detections: usize, rejected: usize);

    /// A submission failed before any track was touched.
    fn failure(&mut self, message: &str);

    /// How long a named stage took for one submission.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// End-of-session report. Default: no-op.
    fn summary(&self) {}
}

pub struct NullSessionLogger;

impl SessionLogger for NullSessionLogger {
    fn submission(&mut self, _update: &TrackUpdate, _detections: usize, _rejected: usize) {}
    fn failure(&mut self, _message: &str) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
}

/// Forwards events to the `log` facade and accumulates per-stage timings
/// and per-submission metrics for a closing summary.
#[derive(Default)]
pub struct LogSessionLogger {
    submissions: usize,
    failures: usize,
    timings: BTreeMap<String, Vec<f64>>,
    metrics: BTreeMap<&'static str, Vec<f64>>,
}

impl LogSessionLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, name: &'static str, value: usize) {
        self.metrics.entry(name).or_default().push(value as f64);
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    /// Formatted summary, or `None` before the first submission attempt.
    pub fn summary_string(&self) -> Option<String> {
        if self.submissions == 0 && self.failures == 0 {
            return None;
        }

        let mut lines = vec![format!(
            "Session summary ({} submissions, {} failed):",
            self.submissions, self.failures
        )];

        for (stage, durations) in &self.timings {
            let total: f64 = durations.iter().sum();
            let avg = total / durations.len().max(1) as f64;
            lines.push(format!("  {stage:10}: avg {avg:6.1}ms  total {total:7.0}ms"));
        }
        for (name, values) in &self.metrics {
            let avg = values.iter().sum::<f64>() / values.len().max(1) as f64;
            lines.push(format!("  {name}: avg {avg:.1}"));
        }

        Some(lines.join("\n"))
    }
}

impl SessionLogger for LogSessionLogger {
    fn submission(&mut self, update: &TrackUpdate, detections: usize, rejected: usize) {
        self.submissions += 1;
        self.record("detections", detections);
        self.record("rejected", rejected);
        self.record("created_tracks", update.created.len());
        self.record("retired_tracks", update.retired.len());
        self.record("active_tracks", update.active);

        log::info!(
            "Submission {}: {detections} faces ({rejected} rejected), {} matched, {} new, {} retired, {} active",
            update.sequence,
            update.matched.len(),
            update.created.len(),
            update.retired.len(),
            update.active
        );
    }

    fn failure(&mut self, message: &str) {
        self.failures += 1;
        log::warn!("{message}");
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
