use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use agelens_core::detection::domain::face_analyzer::FaceAnalyzer;
use agelens_core::detection::infrastructure::deadline_face_analyzer::DeadlineFaceAnalyzer;
use agelens_core::detection::infrastructure::onnx_face_analyzer::{
    OnnxFaceAnalyzer, DEFAULT_CONFIDENCE,
};
use agelens_core::imaging::domain::image_reader::{is_supported_image, ImageReader};
use agelens_core::imaging::infrastructure::image_file_reader::ImageFileReader;
use agelens_core::pipeline::analyze_image_use_case::AnalyzeImageUseCase;
use agelens_core::pipeline::session_logger::LogSessionLogger;
use agelens_core::shared::config::EngineConfig;
use agelens_core::shared::constants::{
    DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL, GENDERAGE_MODEL_NAME,
};
use agelens_core::shared::model_resolver::{self, ModelSource};
use agelens_core::statistics::domain::statistics_aggregator::StatisticsSummary;
use agelens_core::tracking::domain::stability_filter::SmoothingPolicy;
use agelens_core::tracking::domain::stable_result::StableResult;

/// Stable age and gender estimates for the faces in a series of images.
///
/// Images are submitted in order; the same face seen again is matched to
/// its earlier track and its age estimate is refined.
#[derive(Parser)]
#[command(name = "agelens")]
struct Cli {
    /// Image files, one submission each.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// JSON engine configuration; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Years subtracted from every raw age estimate.
    #[arg(long)]
    age_offset: Option<f64>,

    /// Ages kept per face for smoothing.
    #[arg(long)]
    history: Option<usize>,

    /// Submissions a face may be missing before it is forgotten.
    #[arg(long)]
    max_missed: Option<u32>,

    /// Minimum box overlap (IoU) to match a face to a known person.
    #[arg(long)]
    min_iou: Option<f64>,

    /// Confidence needed to change a person's gender label (0.0-1.0).
    #[arg(long)]
    gender_threshold: Option<f64>,

    /// Age smoothing: mean, recency_weighted or median.
    #[arg(long)]
    smoothing: Option<String>,

    /// Per-image analysis deadline in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,

    /// Face detector ONNX model (downloaded when omitted).
    #[arg(long)]
    detector_model: Option<PathBuf>,

    /// Gender/age ONNX model (looked up in the model cache when omitted).
    #[arg(long)]
    genderage_model: Option<PathBuf>,

    /// Emit one JSON object per line instead of text.
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let config = build_config(&cli)?;

    let analyzer = build_analyzer(&cli, &config)?;
    let mut use_case =
        AnalyzeImageUseCase::new(analyzer, &config, Box::new(LogSessionLogger::new()))?;
    let mut reader = ImageFileReader::new();

    for image in &cli.images {
        let outcome = reader
            .read(image)
            .map_err(|e| e.to_string())
            .and_then(|frame| use_case.process(&frame).map_err(|e| e.to_string()));

        match outcome {
            Ok(results) => print_results(image, &results, cli.json)?,
            Err(reason) => {
                log::warn!("{}: {reason}", image.display());
                if cli.json {
                    let line = serde_json::json!({
                        "image": image.display().to_string(),
                        "error": format!("unable to analyze {}", image.display()),
                    });
                    println!("{line}");
                } else {
                    println!("unable to analyze {}", image.display());
                }
            }
        }
    }

    print_statistics(&use_case.statistics(), cli.json)?;
    use_case.finish();
    Ok(())
}

fn build_config(cli: &Cli) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    if let Some(offset) = cli.age_offset {
        config.age_offset = offset;
    }
    if let Some(capacity) = cli.history {
        config.history_capacity = capacity;
    }
    if let Some(max_missed) = cli.max_missed {
        config.max_missed = max_missed;
    }
    if let Some(min_iou) = cli.min_iou {
        config.min_iou = min_iou;
    }
    if let Some(threshold) = cli.gender_threshold {
        config.gender_override_confidence = threshold;
    }
    if let Some(smoothing) = &cli.smoothing {
        config.smoothing = parse_smoothing(smoothing)?;
    }
    if let Some(ms) = cli.timeout_ms {
        config.adapter_timeout_ms = ms;
    }

    config.validate()?;
    Ok(config)
}

fn build_analyzer(
    cli: &Cli,
    config: &EngineConfig,
) -> Result<Box<dyn FaceAnalyzer>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {DETECTOR_MODEL_NAME}");
    let detector_path = model_resolver::resolve(
        &ModelSource {
            name: DETECTOR_MODEL_NAME,
            explicit: cli.detector_model.as_deref(),
            url: Some(DETECTOR_MODEL_URL),
        },
        Some(Box::new(download_progress)),
    )?;

    log::info!("Resolving model: {GENDERAGE_MODEL_NAME}");
    let genderage_path = model_resolver::resolve(
        &ModelSource {
            name: GENDERAGE_MODEL_NAME,
            explicit: cli.genderage_model.as_deref(),
            url: None,
        },
        None,
    )?;

    let onnx = OnnxFaceAnalyzer::new(&detector_path, &genderage_path, cli.confidence)?;
    Ok(Box::new(DeadlineFaceAnalyzer::new(
        Box::new(onnx),
        config.adapter_timeout(),
    )))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for image in &cli.images {
        if !image.exists() {
            return Err(format!("Input file not found: {}", image.display()).into());
        }
        if !is_supported_image(image) {
            return Err(format!("Not a supported image: {}", image.display()).into());
        }
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    for model in [&cli.detector_model, &cli.genderage_model].into_iter().flatten() {
        if !model.exists() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    Ok(())
}

fn parse_smoothing(name: &str) -> Result<SmoothingPolicy, String> {
    match name {
        "mean" => Ok(SmoothingPolicy::Mean),
        "recency_weighted" => Ok(SmoothingPolicy::RecencyWeighted),
        "median" => Ok(SmoothingPolicy::Median),
        other => Err(format!(
            "Smoothing must be one of: mean, recency_weighted, median, got '{other}'"
        )),
    }
}

fn print_results(
    image: &Path,
    results: &[StableResult],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let line = serde_json::json!({
            "image": image.display().to_string(),
            "faces": results,
        });
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    println!("{}: {} face(s)", image.display(), results.len());
    for r in results {
        let status = if r.is_stable {
            "STABLE".to_string()
        } else {
            format!("LEARNING {}", r.sample_count)
        };
        let seen = if r.seen_this_submission { "" } else { " (not seen)" };
        println!(
            "  {}: age {:.1}, {}, {status}{seen}",
            r.id, r.age, r.gender
        );
    }
    Ok(())
}

fn print_statistics(
    stats: &StatisticsSummary,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let line = serde_json::json!({ "statistics": stats });
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    let Some(ages) = stats.ages else {
        println!("No faces recorded");
        return Ok(());
    };
    println!("People: {} ({} male, {} female)", stats.count, stats.male, stats.female);
    println!(
        "Average age: {:.1} (range {:.1}-{:.1})",
        ages.mean, ages.min, ages.max
    );
    for bucket in stats.buckets.iter().filter(|b| b.count > 0) {
        println!("  {:>7}: {}", bucket.label(), bucket.count);
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
    if total > 0 && downloaded >= total {
        eprintln!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("agelens").chain(args.iter().copied()))
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = build_config(&cli(&[
            "a.jpg",
            "--age-offset",
            "2.5",
            "--history",
            "8",
            "--smoothing",
            "median",
        ]))
        .unwrap();

        assert_eq!(config.age_offset, 2.5);
        assert_eq!(config.history_capacity, 8);
        assert_eq!(config.smoothing, SmoothingPolicy::Median);
        assert_eq!(config.max_missed, EngineConfig::default().max_missed);
    }

    #[test]
    fn test_invalid_override_rejected() {
        assert!(build_config(&cli(&["a.jpg", "--min-iou", "0"])).is_err());
        assert!(build_config(&cli(&["a.jpg", "--smoothing", "mode"])).is_err());
    }

    #[test]
    fn test_validate_rejects_missing_image() {
        let err = validate(&cli(&["/nonexistent/face.jpg"])).unwrap_err();
        assert!(err.to_string().contains("Input file not found"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("crowd.png");
        std::fs::write(&image, b"").unwrap();
        let path = image.to_string_lossy().into_owned();

        let err = validate(&cli(&[&path, "--confidence", "1.5"])).unwrap_err();

        assert!(err.to_string().contains("Confidence"));
    }
}
