// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture and classification pipelines

use std::fmt;
use std::path::PathBuf;

/// Device configuration errors
///
/// Only failure to acquire the configuration lock is fatal; individual
/// control writes degrade gracefully (the controller skips them).
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// The device's configuration lock could not be acquired
    LockUnavailable(String),
    /// A supported control rejected the requested value
    ControlRejected(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::LockUnavailable(msg) => {
                write!(f, "Configuration lock unavailable: {}", msg)
            }
            ConfigError::ControlRejected(msg) => write!(f, "Control rejected: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Capture session errors
#[derive(Debug, Clone)]
pub enum CaptureError {
    /// Camera access was denied by the platform
    AuthorizationDenied,
    /// The default capture device is missing or cannot be opened
    DeviceUnavailable(String),
    /// Session configuration failed; the session is inert
    ConfigurationFailed(ConfigError),
    /// The hardware capture failed
    CaptureFailed(String),
    /// The capture completion did not fire within the deadline
    Timeout,
    /// The session is not in the Running state
    SessionNotRunning,
    /// The captured photo could not be processed
    ProcessingFailed(ProcessError),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::AuthorizationDenied => write!(f, "Camera access denied"),
            CaptureError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            CaptureError::ConfigurationFailed(e) => write!(f, "Configuration failed: {}", e),
            CaptureError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            CaptureError::Timeout => write!(f, "Capture timed out"),
            CaptureError::SessionNotRunning => write!(f, "Capture session is not running"),
            CaptureError::ProcessingFailed(e) => write!(f, "Photo processing failed: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<ConfigError> for CaptureError {
    fn from(err: ConfigError) -> Self {
        CaptureError::ConfigurationFailed(err)
    }
}

impl From<ProcessError> for CaptureError {
    fn from(err: ProcessError) -> Self {
        CaptureError::ProcessingFailed(err)
    }
}

/// Still-photo pipeline errors
#[derive(Debug, Clone)]
pub enum ProcessError {
    /// The computed crop rectangle falls outside the source image
    CropOutOfBounds {
        image_width: u32,
        image_height: u32,
        crop_x: i64,
        crop_y: i64,
        crop_width: u32,
        crop_height: u32,
    },
    /// The raw photo carries no decodable pixel data
    InvalidPhoto(String),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::CropOutOfBounds {
                image_width,
                image_height,
                crop_x,
                crop_y,
                crop_width,
                crop_height,
            } => write!(
                f,
                "Crop rectangle {}x{} at ({}, {}) outside {}x{} image",
                crop_width, crop_height, crop_x, crop_y, image_width, image_height
            ),
            ProcessError::InvalidPhoto(msg) => write!(f, "Invalid photo: {}", msg),
        }
    }
}

impl std::error::Error for ProcessError {}

/// Patch extraction errors
#[derive(Debug, Clone)]
pub enum ExtractError {
    /// The image is smaller than one patch in at least one dimension
    ImageTooSmall {
        image_width: u32,
        image_height: u32,
        patch_width: u32,
        patch_height: u32,
    },
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::ImageTooSmall {
                image_width,
                image_height,
                patch_width,
                patch_height,
            } => write!(
                f,
                "Image {}x{} smaller than patch {}x{}",
                image_width, image_height, patch_width, patch_height
            ),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Tensor preprocessing errors
#[derive(Debug, Clone)]
pub enum PreprocessError {
    /// The patch has no decodable pixel data
    NoPixelData,
}

impl fmt::Display for PreprocessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreprocessError::NoPixelData => write!(f, "Patch has no pixel data"),
        }
    }
}

impl std::error::Error for PreprocessError {}

/// Model loading errors (fatal at startup of the inference subsystem)
#[derive(Debug)]
pub enum ModelLoadError {
    /// The model artifact does not exist at the given path
    NotFound(PathBuf),
    /// The artifact exists but could not be parsed by the backend
    Malformed(String),
}

impl fmt::Display for ModelLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelLoadError::NotFound(path) => write!(f, "Model not found: {}", path.display()),
            ModelLoadError::Malformed(msg) => write!(f, "Model malformed: {}", msg),
        }
    }
}

impl std::error::Error for ModelLoadError {}

/// Per-run inference errors
#[derive(Debug, Clone)]
pub enum InferenceError {
    /// Input tensor length does not match the model's declared input length
    ShapeMismatch { expected: usize, actual: usize },
    /// `allocate()` was not called before the first `run()`
    NotAllocated,
    /// The inference backend reported a runtime failure
    BackendError(String),
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceError::ShapeMismatch { expected, actual } => {
                write!(f, "Tensor length {} does not match input {}", actual, expected)
            }
            InferenceError::NotAllocated => write!(f, "Buffers not allocated before run"),
            InferenceError::BackendError(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for InferenceError {}

/// Score aggregation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    /// No patch produced a usable score
    NoValidPatches,
}

impl fmt::Display for AggregationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationError::NoValidPatches => write!(f, "No valid patches to aggregate"),
        }
    }
}

impl std::error::Error for AggregationError {}

/// End-to-end classification errors
///
/// Per-patch preprocessing or inference failures are excluded from the
/// aggregate rather than surfaced here; only total failures propagate.
#[derive(Debug, Clone)]
pub enum ClassifyError {
    /// Patch extraction failed for the whole photo
    Extract(ExtractError),
    /// Every patch failed, leaving nothing to aggregate
    Aggregation(AggregationError),
    /// The evaluation task was cancelled or panicked
    TaskFailed(String),
}

impl fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifyError::Extract(e) => write!(f, "Extraction error: {}", e),
            ClassifyError::Aggregation(e) => write!(f, "Aggregation error: {}", e),
            ClassifyError::TaskFailed(msg) => write!(f, "Evaluation task failed: {}", msg),
        }
    }
}

impl std::error::Error for ClassifyError {}

impl From<ExtractError> for ClassifyError {
    fn from(err: ExtractError) -> Self {
        ClassifyError::Extract(err)
    }
}

impl From<AggregationError> for ClassifyError {
    fn from(err: AggregationError) -> Self {
        ClassifyError::Aggregation(err)
    }
}
