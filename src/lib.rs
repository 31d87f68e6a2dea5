// SPDX-License-Identifier: GPL-3.0-only

//! Camera capture and patch-based infection classification
//!
//! Two subsystems make up the crate. The capture side configures a
//! V4L2 camera for deterministic imaging, streams preview frames into a
//! latest-wins mailbox and produces upright, cropped still photos. The
//! classify side tiles a photo into a fixed grid of patches, scores
//! each patch with an ONNX binary classifier and averages the infected
//! confidences into a photo-level verdict.

pub mod capture;
pub mod classify;
pub mod config;
pub mod constants;
pub mod errors;
pub mod photo;

pub use capture::{CaptureEngine, CapturePolicies, V4l2Device};
pub use classify::{ClassifyPipeline, InferenceEngine, Label, Verdict};
pub use config::Config;
pub use photo::{CropGeometry, StillPhotoPipeline};
