// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants
//!
//! Crop geometry and the patch grid are fixed design constants of the
//! sampling protocol: the operator aligns the specimen inside an
//! on-screen guide window, the still photo is cropped to the region the
//! window covers, and the crop is then tiled into a 5x7 grid of
//! overlapping patches sized for the classifier input.

use std::time::Duration;

// ===== Patch grid =====

/// Patch width in pixels (matches the classifier input width)
pub const PATCH_WIDTH: u32 = 255;
/// Patch height in pixels (matches the classifier input height)
pub const PATCH_HEIGHT: u32 = 255;
/// Number of patch columns in the sampling grid
pub const GRID_COLUMNS: u32 = 5;
/// Number of patch rows in the sampling grid
pub const GRID_ROWS: u32 = 7;
/// Horizontal steps between patch origins (columns - 1)
pub const HORIZONTAL_STEPS: u32 = GRID_COLUMNS - 1;
/// Vertical steps between patch origins (rows - 1)
pub const VERTICAL_STEPS: u32 = GRID_ROWS - 1;
/// Total patches produced per photo
pub const PATCHES_PER_PHOTO: usize = (GRID_COLUMNS * GRID_ROWS) as usize;

// ===== Classifier contract =====

/// Model input width in pixels
pub const MODEL_INPUT_WIDTH: u32 = 255;
/// Model input height in pixels
pub const MODEL_INPUT_HEIGHT: u32 = 255;
/// Model input channel count (RGB)
pub const MODEL_INPUT_CHANNELS: u32 = 3;
/// Model input length in floats
pub const MODEL_INPUT_LEN: usize =
    (MODEL_INPUT_WIDTH * MODEL_INPUT_HEIGHT * MODEL_INPUT_CHANNELS) as usize;
/// Model output class count: [not_infected, infected]
pub const MODEL_OUTPUT_CLASSES: usize = 2;
/// Mean infected confidence above which the verdict is Infected.
/// The boundary value itself maps to NotInfected (strict inequality).
pub const INFECTED_THRESHOLD: f32 = 0.5;

// ===== Still-photo crop geometry =====

/// Crop target width in pixels
pub const CROP_WIDTH: u32 = 450;
/// Crop target height in pixels
pub const CROP_HEIGHT: u32 = 680;
/// Horizontal crop offset from the centered position, in pixels.
/// Together with the vertical offset below this places the crop under
/// the on-screen guide window the operator aligns the specimen with.
pub const CROP_OFFSET_X: i64 = -305;
/// Vertical crop offset from the centered position, in pixels
pub const CROP_OFFSET_Y: i64 = 97;

// ===== Capture =====

/// Fixed rotation correction applied to every preview frame, in degrees
/// clockwise. Sensors on the supported hardware deliver frames rotated
/// relative to the display convention.
pub const PREVIEW_ROTATION_DEGREES: u32 = 270;

/// Deadline for a single still-photo capture request
pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for one preview frame read before the capture loop retries
pub const FRAME_READ_TIMEOUT: Duration = Duration::from_millis(1000);

// ===== Default locked-policy values =====

/// Default white balance temperature for the locked policy, in Kelvin
pub const DEFAULT_WB_TEMPERATURE: f32 = 5000.0;
/// Default white balance tint for the locked policy
pub const DEFAULT_WB_TINT: f32 = 30.0;
/// Default exposure duration for the locked policy (1/60 s)
pub const DEFAULT_EXPOSURE_DURATION: Duration = Duration::from_micros(16_666);
/// Default ISO for the locked policy
pub const DEFAULT_EXPOSURE_ISO: u32 = 100;
/// Default exposure bias for the auto policy, in EV
pub const DEFAULT_EXPOSURE_BIAS_EV: f32 = 0.0;
