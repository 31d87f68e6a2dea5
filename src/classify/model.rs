// SPDX-License-Identifier: GPL-3.0-only

//! ONNX inference engine
//!
//! One session serves the whole process; callers serialize access. The
//! engine is explicit about its lifecycle: `load` parses the model,
//! `allocate` binds the input name and buffer contract, and only then
//! may `run` be called.

use std::path::Path;

use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use crate::constants::{MODEL_INPUT_CHANNELS, MODEL_INPUT_LEN, MODEL_OUTPUT_CLASSES};
use crate::errors::{InferenceError, ModelLoadError};

use super::preprocess::{InputTensor, TensorLayout};

/// Class confidences for one patch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceResult {
    pub not_infected: f32,
    pub infected: f32,
}

/// Binary patch classifier backed by an ONNX session
pub struct InferenceEngine {
    session: Session,
    input_name: String,
    output_name: String,
    allocated: bool,
}

impl InferenceEngine {
    /// Load the model artifact from disk
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self, ModelLoadError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(ModelLoadError::NotFound(path.to_path_buf()));
        }

        let session = Session::builder()
            .map_err(|e| ModelLoadError::Malformed(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| ModelLoadError::Malformed(e.to_string()))?;

        info!(path = %path.display(), "Classifier model loaded");

        Ok(Self {
            session,
            input_name: String::new(),
            output_name: String::new(),
            allocated: false,
        })
    }

    /// Bind the model's input and output names and prepare for inference
    ///
    /// Must be called once before the first `run`.
    pub fn allocate(&mut self) -> Result<(), InferenceError> {
        let input = self
            .session
            .inputs()
            .first()
            .ok_or_else(|| InferenceError::BackendError("model declares no inputs".into()))?;
        self.input_name = input.name().to_string();
        let output = self
            .session
            .outputs()
            .first()
            .ok_or_else(|| InferenceError::BackendError("model declares no outputs".into()))?;
        self.output_name = output.name().to_string();
        self.allocated = true;
        debug!(
            input = %self.input_name,
            output = %self.output_name,
            "Inference buffers allocated"
        );
        Ok(())
    }

    /// Classify one preprocessed patch
    pub fn run(&mut self, tensor: &InputTensor) -> Result<InferenceResult, InferenceError> {
        if !self.allocated {
            return Err(InferenceError::NotAllocated);
        }
        if tensor.len() != MODEL_INPUT_LEN {
            return Err(InferenceError::ShapeMismatch {
                expected: MODEL_INPUT_LEN,
                actual: tensor.len(),
            });
        }

        let shape: Vec<i64> = match tensor.layout {
            TensorLayout::Nhwc => vec![
                1,
                i64::from(tensor.height),
                i64::from(tensor.width),
                i64::from(MODEL_INPUT_CHANNELS),
            ],
            TensorLayout::Nchw => vec![
                1,
                i64::from(MODEL_INPUT_CHANNELS),
                i64::from(tensor.height),
                i64::from(tensor.width),
            ],
        };

        let input = Tensor::from_array((shape, tensor.data.clone().into_boxed_slice()))
            .map_err(|e| InferenceError::BackendError(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| InferenceError::BackendError(e.to_string()))?;

        let (_shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::BackendError(e.to_string()))?;

        if data.len() != MODEL_OUTPUT_CLASSES {
            return Err(InferenceError::ShapeMismatch {
                expected: MODEL_OUTPUT_CLASSES,
                actual: data.len(),
            });
        }

        Ok(InferenceResult {
            not_infected: data[0],
            infected: data[1],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_not_found() {
        let result = InferenceEngine::load("/nonexistent/model.onnx");
        assert!(matches!(result, Err(ModelLoadError::NotFound(_))));
    }
}
