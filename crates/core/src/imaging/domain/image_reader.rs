use std::path::Path;

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Decodes a still image into an RGB [`Frame`].
pub trait ImageReader: Send {
    fn read(&mut self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>>;
}

/// True when the extension is one the readers accept (case-insensitive).
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}
