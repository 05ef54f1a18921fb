use std::time::Duration;

use thiserror::Error;

use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("face analysis model unavailable: {0}")]
    Unavailable(String),
    #[error("face analysis rejected the image: {0}")]
    InvalidInput(String),
    #[error("face analysis timed out after {0:?}")]
    Timeout(Duration),
}

/// Domain interface for the external face/age/gender model.
///
/// Implementations may hold inference sessions or caches, hence `&mut self`.
pub trait FaceAnalyzer: Send {
    fn analyze(&mut self, frame: &Frame) -> Result<Vec<Detection>, AdapterError>;
}
