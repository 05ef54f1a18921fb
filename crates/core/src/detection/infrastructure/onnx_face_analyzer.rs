/// Face analyzer backed by two ONNX Runtime sessions: a YOLO face detector
/// (letterbox preprocessing, NMS) followed by an InsightFace-style
/// gender/age head evaluated on a square crop around every face.
use std::error::Error;
use std::path::Path;

use ndarray::Array4;
use ort::session::Session;

use crate::detection::domain::detection::{Detection, Gender};
use crate::detection::domain::face_analyzer::{AdapterError, FaceAnalyzer};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Fallback detector resolution when the model input shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default face detection confidence threshold.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

const NMS_IOU_THRESH: f64 = 0.45;

const GENDERAGE_INPUT_SIZE: usize = 96;

/// Gender/age crop side relative to the longer side of the face box.
const GENDERAGE_CROP_SCALE: f64 = 1.5;

pub struct OnnxFaceAnalyzer {
    detector: Session,
    genderage: Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxFaceAnalyzer {
    pub fn new(
        detector_path: &Path,
        genderage_path: &Path,
        confidence: f64,
    ) -> Result<Self, Box<dyn Error>> {
        let detector = build_session(detector_path)?;
        let genderage = build_session(genderage_path)?;

        // Detector input is NCHW; H is taken as the square side.
        let input_size = detector
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { ref shape, .. }
                    if shape.len() >= 4 && shape[2] > 0 =>
                {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::debug!("Face detector input size: {input_size}");
        Ok(Self {
            detector,
            genderage,
            confidence,
            input_size,
        })
    }

    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<ScoredBox>, Box<dyn Error>> {
        let (tensor, letterbox) = letterbox(frame, self.input_size);
        let input = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.detector.run(ort::inputs![input])?;
        let output = outputs[0].try_extract_array::<f32>()?;
        let shape = output.shape().to_vec();
        let data = output.as_slice().ok_or("Cannot get detector output slice")?;

        let mut boxes = parse_predictions(data, &shape, self.confidence, &letterbox)?
            .into_iter()
            .filter_map(|b| b.clamped(frame.width() as f64, frame.height() as f64))
            .collect::<Vec<_>>();
        Ok(nms(&mut boxes, NMS_IOU_THRESH))
    }

    fn estimate(
        &mut self,
        frame: &Frame,
        bbox: &BoundingBox,
    ) -> Result<(f64, Gender, f64), Box<dyn Error>> {
        let crop = bbox.expanded_square(GENDERAGE_CROP_SCALE);
        let patch = frame.sample_square(&crop, GENDERAGE_INPUT_SIZE);
        let size = GENDERAGE_INPUT_SIZE;
        let tensor = Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            patch[(y * size + x) * 3 + c] as f32
        });

        let input = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.genderage.run(ort::inputs![input])?;
        let output = outputs[0].try_extract_array::<f32>()?;
        let values = output
            .as_slice()
            .ok_or("Cannot get gender/age output slice")?;
        Ok(decode_genderage(values)?)
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn analyze(&mut self, frame: &Frame) -> Result<Vec<Detection>, AdapterError> {
        if frame.is_empty() || frame.channels() < 3 {
            return Err(AdapterError::InvalidInput(format!(
                "expected a non-empty RGB image, got {}x{}x{}",
                frame.width(),
                frame.height(),
                frame.channels()
            )));
        }

        let faces = self.detect_faces(frame).map_err(inference_failed)?;
        faces
            .iter()
            .map(|face| {
                let (age, gender, confidence) =
                    self.estimate(frame, &face.bbox).map_err(inference_failed)?;
                Ok(Detection::new(face.bbox, age, gender, confidence))
            })
            .collect()
    }
}

fn inference_failed(err: Box<dyn Error>) -> AdapterError {
    AdapterError::Unavailable(err.to_string())
}

fn build_session(path: &Path) -> Result<Session, Box<dyn Error>> {
    let session = Session::builder()?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(path)?;
    Ok(session)
}

/// Platform accelerator when one is compiled in; ONNX Runtime falls back to
/// CPU when it cannot be initialised.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

// ---------------------------------------------------------------------------
// Detector pre/post-processing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: f64,
    pad_y: f64,
}

impl Letterbox {
    fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Scales the frame into a gray-padded `target` square, NCHW, values in
/// `[0, 1]`.
fn letterbox(frame: &Frame, target: u32) -> (Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let scale = (target as f64 / fw).min(target as f64 / fh);
    let new_w = ((fw * scale).round() as u32).min(target);
    let new_h = ((fh * scale).round() as u32).min(target);
    let pad_x = (target - new_w) / 2;
    let pad_y = (target - new_h) / 2;

    let size = target as usize;
    let mut tensor = Array4::<f32>::from_elem((1, 3, size, size), 114.0 / 255.0);
    let src = frame.as_ndarray();
    let max_y = frame.height() as usize - 1;
    let max_x = frame.width() as usize - 1;

    for y in 0..new_h as usize {
        let sy = ((y as f64 / scale) as usize).min(max_y);
        for x in 0..new_w as usize {
            let sx = ((x as f64 / scale) as usize).min(max_x);
            for c in 0..3 {
                tensor[[0, c, pad_y as usize + y, pad_x as usize + x]] =
                    src[[sy, sx, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x: pad_x as f64,
            pad_y: pad_y as f64,
        },
    )
}

#[derive(Debug, Clone, PartialEq)]
struct ScoredBox {
    bbox: BoundingBox,
    score: f64,
}

impl ScoredBox {
    /// Clips to the frame; `None` if nothing visible remains.
    fn clamped(&self, width: f64, height: f64) -> Option<ScoredBox> {
        let x1 = self.bbox.x.clamp(0.0, width);
        let y1 = self.bbox.y.clamp(0.0, height);
        let x2 = self.bbox.right().clamp(0.0, width);
        let y2 = self.bbox.bottom().clamp(0.0, height);
        let bbox = BoundingBox::from_corners(x1, y1, x2, y2);
        (!bbox.is_degenerate()).then_some(ScoredBox {
            bbox,
            score: self.score,
        })
    }
}

/// Reads `[cx, cy, w, h, conf, ...]` rows from a `[1, features, boxes]` or
/// `[1, boxes, features]` output and maps them back to frame coordinates.
fn parse_predictions(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    letterbox: &Letterbox,
) -> Result<Vec<ScoredBox>, String> {
    if shape.len() != 3 {
        return Err(format!("Unexpected detector output shape: {shape:?}"));
    }
    let transposed = shape[1] < shape[2];
    let (num_boxes, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_boxes * num_feats {
        return Err(format!("Detector output too small for shape {shape:?}"));
    }

    let value = |i: usize, f: usize| -> f64 {
        if transposed {
            data[f * num_boxes + i] as f64
        } else {
            data[i * num_feats + f] as f64
        }
    };

    let mut boxes = Vec::new();
    for i in 0..num_boxes {
        let score = value(i, 4);
        if score < confidence {
            continue;
        }
        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        let (x1, y1) = letterbox.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_frame(cx + w / 2.0, cy + h / 2.0);
        boxes.push(ScoredBox {
            bbox: BoundingBox::from_corners(x1, y1, x2, y2),
            score,
        });
    }
    Ok(boxes)
}

/// Greedy NMS: highest score first, drop anything overlapping a kept box.
fn nms(boxes: &mut [ScoredBox], iou_thresh: f64) -> Vec<ScoredBox> {
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut keep: Vec<ScoredBox> = Vec::new();
    for candidate in boxes.iter() {
        if keep.iter().all(|k| k.bbox.iou(&candidate.bbox) <= iou_thresh) {
            keep.push(candidate.clone());
        }
    }
    keep
}

// ---------------------------------------------------------------------------
// Gender/age head
// ---------------------------------------------------------------------------

/// Output layout: `[female_score, male_score, age / 100]`.
fn decode_genderage(values: &[f32]) -> Result<(f64, Gender, f64), String> {
    if values.len() < 3 {
        return Err(format!(
            "gender/age output has {} values, expected 3",
            values.len()
        ));
    }
    let (female, male) = gender_probabilities(values[0] as f64, values[1] as f64);
    let (gender, confidence) = if male > female {
        (Gender::Male, male)
    } else {
        (Gender::Female, female)
    };
    let age = (values[2] as f64 * 100.0).round().max(0.0);
    Ok((age, gender, confidence))
}

/// Passes probabilities through; anything else is treated as logits.
fn gender_probabilities(female: f64, male: f64) -> (f64, f64) {
    let is_probability = |p: f64| (0.0..=1.0).contains(&p);
    if is_probability(female) && is_probability(male) && ((female + male) - 1.0).abs() < 1e-3 {
        return (female, male);
    }
    let peak = female.max(male);
    let ef = (female - peak).exp();
    let em = (male - peak).exp();
    (ef / (ef + em), em / (ef + em))
}
