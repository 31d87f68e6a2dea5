// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing capture devices
//! - Taking cropped still photos
//! - Capturing and classifying a specimen photo
//! - Classifying an existing photo file

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;

use patchscan::capture::{CaptureDevice, CaptureEngine, CapturePolicies, CapturedPhoto, V4l2Device};
use patchscan::classify::{
    ClassifyPipeline, InferenceEngine, PatchExtractor, TensorPreprocessor, Verdict,
};
use patchscan::config::Config;
use patchscan::photo::StillPhotoPipeline;

/// List all available capture devices
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = V4l2Device::enumerate();

    if devices.is_empty() {
        println!("No capture devices found.");
        return Ok(());
    }

    println!("Available capture devices:");
    println!();
    for device in &devices {
        println!("  {}  {} ({})", device.path, device.name, device.driver);
    }

    Ok(())
}

/// Capture one cropped still photo and save it
pub fn take_photo(
    device: Option<String>,
    output: Option<PathBuf>,
    locked: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let photo = capture_one(&config, device, locked)?;

    let output_path = match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            path
        }
        None => {
            let dir = default_photo_dir();
            std::fs::create_dir_all(&dir)?;
            let timestamp = Local::now().format("%Y%m%d_%H%M%S");
            dir.join(format!("photo_{}.jpg", timestamp))
        }
    };

    photo.image.save(&output_path)?;
    println!("Photo saved: {}", output_path.display());
    Ok(())
}

/// Capture a photo and run the classifier on it
pub fn scan(
    device: Option<String>,
    model: Option<PathBuf>,
    locked: bool,
    save: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let pipeline = Arc::new(build_pipeline(&config, model)?);

    let photo = capture_one(&config, device, locked)?;
    println!("Captured {}x{} photo", photo.width(), photo.height());

    if let Some(path) = save {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        photo.image.save(&path)?;
        println!("Photo saved: {}", path.display());
    }

    let rt = tokio::runtime::Runtime::new()?;
    let verdict = rt.block_on(pipeline.evaluate_async(photo))?;
    print_verdict(&verdict);
    Ok(())
}

/// Classify an existing photo file
pub fn classify_file(
    input: PathBuf,
    model: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let pipeline = Arc::new(build_pipeline(&config, model)?);

    let image = image::open(&input)?.to_rgb8();
    println!(
        "Classifying {} ({}x{})",
        input.display(),
        image.width(),
        image.height()
    );

    let rt = tokio::runtime::Runtime::new()?;
    let verdict = rt.block_on(pipeline.evaluate_async(CapturedPhoto { image }))?;
    print_verdict(&verdict);
    Ok(())
}

/// Print or persist the active configuration
pub fn show_config(init: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    if init {
        config.save()?;
        println!();
        println!("Written to {}", Config::path()?.display());
    }
    Ok(())
}

/// Run one capture session to completion and return the photo
fn capture_one(
    config: &Config,
    device: Option<String>,
    locked: bool,
) -> Result<CapturedPhoto, Box<dyn std::error::Error>> {
    let device_path = match device.or_else(|| config.device_path.clone()) {
        Some(path) => path,
        None => {
            let devices = V4l2Device::enumerate();
            devices
                .first()
                .map(|d| d.path.clone())
                .ok_or("No capture devices found")?
        }
    };

    let policies = if locked {
        CapturePolicies::locked()
    } else {
        config.policies
    };

    let device = V4l2Device::open(&device_path)?;
    println!("Using device: {}", device.info().name);

    let mut engine = CaptureEngine::new(
        Box::new(device),
        policies,
        StillPhotoPipeline::new(config.crop),
    );
    engine.start()?;
    let photo = engine.capture_photo();
    engine.stop();

    Ok(photo?)
}

/// Build the classification pipeline from config plus overrides
fn build_pipeline(
    config: &Config,
    model: Option<PathBuf>,
) -> Result<ClassifyPipeline, Box<dyn std::error::Error>> {
    let model_path = model
        .or_else(|| config.model_path.clone())
        .ok_or("No model path given (use --model or set model_path in the config)")?;

    let mut engine = InferenceEngine::load(&model_path)?;
    engine.allocate()?;

    Ok(ClassifyPipeline::new(
        PatchExtractor::default(),
        TensorPreprocessor::new(config.tensor_layout),
        Box::new(engine),
    ))
}

fn print_verdict(verdict: &Verdict) {
    println!();
    println!("Verdict: {}", verdict.label);
    println!(
        "Mean infected confidence: {:.3} over {} patches",
        verdict.mean_score,
        verdict.per_patch_scores.len()
    );
}

fn default_photo_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("patchscan")
}
