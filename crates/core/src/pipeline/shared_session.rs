use std::sync::{Arc, Mutex, PoisonError};

use crate::shared::frame::Frame;
use crate::statistics::domain::statistics_aggregator::StatisticsSummary;
use crate::tracking::domain::stable_result::StableResult;

use super::analyze_image_use_case::{AnalyzeImageUseCase, ProcessError};

/// Cloneable handle that serializes submissions from several threads onto
/// one [`AnalyzeImageUseCase`].
///
/// The whole submission, analyzer call included, runs under the lock, so
/// two submissions never interleave their track updates.
#[derive(Clone)]
pub struct SharedAnalysisSession {
    inner: Arc<Mutex<AnalyzeImageUseCase>>,
}

impl SharedAnalysisSession {
    pub fn new(use_case: AnalyzeImageUseCase) -> Self {
        Self {
            inner: Arc::new(Mutex::new(use_case)),
        }
    }

    pub fn process(&self, frame: &Frame) -> Result<Vec<StableResult>, ProcessError> {
        let mut use_case = self.inner.lock().map_err(|_| ProcessError::Poisoned)?;
        use_case.process(frame)
    }

    /// Still readable after a panicked submission.
    pub fn statistics(&self) -> StatisticsSummary {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .statistics()
    }

    pub fn finish(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::{Detection, Gender};
    use crate::detection::domain::face_analyzer::{AdapterError, FaceAnalyzer};
    use crate::pipeline::session_logger::NullSessionLogger;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::config::EngineConfig;
    use std::thread;

    struct FixedAnalyzer;

    impl FaceAnalyzer for FixedAnalyzer {
        fn analyze(&mut self, _frame: &Frame) -> Result<Vec<Detection>, AdapterError> {
            Ok(vec![Detection::new(
                BoundingBox::new(10.0, 10.0, 50.0, 50.0),
                34.0,
                Gender::Female,
                0.9,
            )])
        }
    }

    struct PanickingAnalyzer;

    impl FaceAnalyzer for PanickingAnalyzer {
        fn analyze(&mut self, _frame: &Frame) -> Result<Vec<Detection>, AdapterError> {
            panic!("model crashed");
        }
    }

    fn session() -> SharedAnalysisSession {
        session_with(Box::new(FixedAnalyzer))
    }

    fn session_with(analyzer: Box<dyn FaceAnalyzer>) -> SharedAnalysisSession {
        let use_case = AnalyzeImageUseCase::new(
            analyzer,
            &EngineConfig::default(),
            Box::new(NullSessionLogger),
        )
        .unwrap();
        SharedAnalysisSession::new(use_case)
    }

    #[test]
    fn test_concurrent_submissions_share_one_track() {
        let session = session();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = session.clone();
                thread::spawn(move || {
                    let frame = Frame::new(vec![0u8; 12], 2, 2, 3);
                    for _ in 0..5 {
                        s.process(&frame).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = session.statistics();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.ages.unwrap().mean, 30.0);
        assert_eq!(session.inner.lock().unwrap().tracks().sequence(), 40);
    }

    #[test]
    fn test_panicked_submission_poisons_later_ones() {
        let session = session_with(Box::new(PanickingAnalyzer));
        let s = session.clone();
        let crashed = thread::spawn(move || {
            let frame = Frame::new(vec![0u8; 12], 2, 2, 3);
            let _ = s.process(&frame);
        })
        .join();
        assert!(crashed.is_err());

        let frame = Frame::new(vec![0u8; 12], 2, 2, 3);
        assert_eq!(session.process(&frame), Err(ProcessError::Poisoned));
        assert!(!session.statistics().has_data());
        session.finish();
    }

    #[test]
    fn test_statistics_before_any_submission() {
        assert!(!session().statistics().has_data());
    }
}
