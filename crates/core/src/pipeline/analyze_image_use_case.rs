use std::time::Instant;

use thiserror::Error;

use crate::detection::domain::detection::{CorrectedDetection, Detection, InputError};
use crate::detection::domain::face_analyzer::{AdapterError, FaceAnalyzer};
use crate::shared::config::{AdapterFailurePolicy, ConfigError, EngineConfig};
use crate::shared::frame::Frame;
use crate::statistics::domain::statistics_aggregator::{summarize, StatisticsSummary};
use crate::tracking::domain::bias_corrector::BiasCorrector;
use crate::tracking::domain::stable_result::StableResult;
use crate::tracking::domain::track_set::TrackSet;

use super::session_logger::SessionLogger;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessError {
    #[error("unable to analyze this image: {0}")]
    Adapter(#[from] AdapterError),
    #[error("analysis session is unusable after a panic in another submission")]
    Poisoned,
}

/// Per-image pipeline: analyze → correct → track → report.
///
/// Owns the track set, so repeated submissions through the same instance
/// refine the same faces. A failed analysis leaves every track untouched.
pub struct AnalyzeImageUseCase {
    analyzer: Box<dyn FaceAnalyzer>,
    corrector: BiasCorrector,
    tracks: TrackSet,
    failure_policy: AdapterFailurePolicy,
    logger: Box<dyn SessionLogger>,
}

impl AnalyzeImageUseCase {
    pub fn new(
        analyzer: Box<dyn FaceAnalyzer>,
        config: &EngineConfig,
        logger: Box<dyn SessionLogger>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            analyzer,
            corrector: BiasCorrector::new(config.age_offset),
            tracks: TrackSet::new(config),
            failure_policy: config.adapter_failure_policy,
            logger,
        })
    }

    /// Runs one submission and returns every active track.
    pub fn process(&mut self, frame: &Frame) -> Result<Vec<StableResult>, ProcessError> {
        let start = Instant::now();
        let raw = self.analyze(frame)?;
        self.logger
            .timing("analyze", start.elapsed().as_secs_f64() * 1000.0);

        let start = Instant::now();
        let (corrected, rejected) = self.correct_all(&raw);
        let update = self.tracks.update(&corrected);
        self.logger
            .timing("track", start.elapsed().as_secs_f64() * 1000.0);
        self.logger.submission(&update, raw.len(), rejected.len());

        Ok(self.tracks.results())
    }

    /// Summary over the current tracks. Read-only.
    pub fn statistics(&self) -> StatisticsSummary {
        summarize(&self.tracks.results())
    }

    pub fn tracks(&self) -> &TrackSet {
        &self.tracks
    }

    pub fn finish(&self) {
        self.logger.summary();
    }

    fn analyze(&mut self, frame: &Frame) -> Result<Vec<Detection>, ProcessError> {
        match self.analyzer.analyze(frame) {
            Ok(detections) => Ok(detections),
            Err(err @ AdapterError::Timeout(_)) => self.fail(err),
            Err(err) => match self.failure_policy {
                AdapterFailurePolicy::TreatAsEmpty => {
                    log::warn!("Face analysis failed ({err}); treating as no faces");
                    Ok(Vec::new())
                }
                AdapterFailurePolicy::Propagate => self.fail(err),
            },
        }
    }

    fn fail(&mut self, err: AdapterError) -> Result<Vec<Detection>, ProcessError> {
        let err = ProcessError::from(err);
        self.logger.failure(&err.to_string());
        Err(err)
    }

    fn correct_all(&self, raw: &[Detection]) -> (Vec<CorrectedDetection>, Vec<InputError>) {
        let mut corrected = Vec::with_capacity(raw.len());
        let mut rejected = Vec::new();
        for detection in raw {
            match self.corrector.correct(detection) {
                Ok(c) => corrected.push(c),
                Err(e) => rejected.push(e),
            }
        }

        if corrected.is_empty() && !rejected.is_empty() {
            log::warn!("All {} detections were malformed", rejected.len());
        }
        for e in &rejected {
            log::debug!("Dropped detection: {e}");
        }
        (corrected, rejected)
    }
}
