pub const DETECTOR_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const DETECTOR_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// InsightFace gender/age head. Not downloadable on its own; it must be
/// present in the model cache or passed explicitly.
pub const GENDERAGE_MODEL_NAME: &str = "genderage.onnx";

pub const DEFAULT_AGE_OFFSET: f64 = 4.0;
pub const DEFAULT_HISTORY_CAPACITY: usize = 5;
/// Upper bound on `history_capacity`; larger smoothing windows are rejected.
pub const MAX_HISTORY_CAPACITY: usize = 1_000;
pub const DEFAULT_MAX_MISSED: u32 = 3;
pub const DEFAULT_MIN_IOU: f64 = 0.3;
pub const DEFAULT_GENDER_OVERRIDE_CONFIDENCE: f64 = 0.8;
pub const DEFAULT_ADAPTER_TIMEOUT_MS: u64 = 10_000;

/// Width of one age histogram bucket, in years.
pub const AGE_BUCKET_WIDTH: f64 = 10.0;
/// Decade buckets below the overflow bucket (`[0,10)` .. `[90,100)`).
pub const AGE_DECADE_BUCKETS: usize = 10;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
