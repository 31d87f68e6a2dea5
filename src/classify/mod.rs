// SPDX-License-Identifier: GPL-3.0-only

//! Patch-based binary infection classification
//!
//! A captured photo is tiled into a fixed grid of patches, each patch
//! is normalized into a float tensor and scored by the ONNX model, and
//! the per-patch infected confidences are averaged into a photo-level
//! verdict.

pub mod aggregate;
pub mod model;
pub mod patches;
pub mod pipeline;
pub mod preprocess;

pub use aggregate::{Label, ScoreAggregator, Verdict};
pub use model::{InferenceEngine, InferenceResult};
pub use patches::{Patch, PatchExtractor};
pub use pipeline::{ClassifyPipeline, PatchClassifier};
pub use preprocess::{InputTensor, TensorLayout, TensorPreprocessor};
