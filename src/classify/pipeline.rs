// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end photo classification
//!
//! Wires extraction, preprocessing, inference and aggregation into one
//! call. A patch that fails preprocessing or inference is logged and
//! excluded from the aggregate; the photo still gets a verdict from the
//! patches that survive. Only a total failure (extraction, or every
//! patch lost) propagates as an error.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::capture::types::CapturedPhoto;
use crate::errors::{ClassifyError, InferenceError};

use super::aggregate::{ScoreAggregator, Verdict};
use super::model::{InferenceEngine, InferenceResult};
use super::patches::PatchExtractor;
use super::preprocess::{InputTensor, TensorPreprocessor};

/// Classifies one preprocessed patch
///
/// [`InferenceEngine`] is the production implementation; tests provide
/// stubs.
pub trait PatchClassifier: Send {
    fn classify(&mut self, tensor: &InputTensor) -> Result<InferenceResult, InferenceError>;
}

impl PatchClassifier for InferenceEngine {
    fn classify(&mut self, tensor: &InputTensor) -> Result<InferenceResult, InferenceError> {
        self.run(tensor)
    }
}

/// Extraction, preprocessing, inference and aggregation for one photo
pub struct ClassifyPipeline {
    extractor: PatchExtractor,
    preprocessor: TensorPreprocessor,
    aggregator: ScoreAggregator,
    /// Single model instance; concurrent evaluations serialize here
    classifier: Mutex<Box<dyn PatchClassifier>>,
}

impl ClassifyPipeline {
    pub fn new(
        extractor: PatchExtractor,
        preprocessor: TensorPreprocessor,
        classifier: Box<dyn PatchClassifier>,
    ) -> Self {
        Self {
            extractor,
            preprocessor,
            aggregator: ScoreAggregator,
            classifier: Mutex::new(classifier),
        }
    }

    /// Classify a photo, blocking until the verdict is ready
    pub fn evaluate(&self, photo: &CapturedPhoto) -> Result<Verdict, ClassifyError> {
        let patches = self.extractor.extract(photo)?;

        let mut classifier = match self.classifier.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut scores = Vec::with_capacity(patches.len());
        for patch in &patches {
            let tensor = match self.preprocessor.preprocess(patch) {
                Ok(tensor) => tensor,
                Err(e) => {
                    warn!(
                        origin_x = patch.origin_x,
                        origin_y = patch.origin_y,
                        error = %e,
                        "Patch preprocessing failed, excluding from aggregate"
                    );
                    continue;
                }
            };
            match classifier.classify(&tensor) {
                Ok(result) => scores.push(result.infected),
                Err(e) => {
                    warn!(
                        origin_x = patch.origin_x,
                        origin_y = patch.origin_y,
                        error = %e,
                        "Patch inference failed, excluding from aggregate"
                    );
                }
            }
        }

        debug!(
            total = patches.len(),
            scored = scores.len(),
            "Patch inference complete"
        );

        Ok(self.aggregator.aggregate(scores)?)
    }

    /// Classify a photo off the async runtime's worker threads
    pub async fn evaluate_async(
        self: Arc<Self>,
        photo: CapturedPhoto,
    ) -> Result<Verdict, ClassifyError> {
        let pipeline = Arc::clone(&self);
        tokio::task::spawn_blocking(move || pipeline.evaluate(&photo))
            .await
            .map_err(|e| ClassifyError::TaskFailed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::aggregate::Label;
    use crate::constants::PATCHES_PER_PHOTO;
    use image::{Rgb, RgbImage};

    /// Returns a fixed infected confidence, optionally failing some runs.
    struct StubClassifier {
        infected: f32,
        fail_first: usize,
        calls: usize,
    }

    impl StubClassifier {
        fn constant(infected: f32) -> Box<Self> {
            Box::new(Self {
                infected,
                fail_first: 0,
                calls: 0,
            })
        }
    }

    impl PatchClassifier for StubClassifier {
        fn classify(&mut self, _tensor: &InputTensor) -> Result<InferenceResult, InferenceError> {
            self.calls += 1;
            if self.calls <= self.fail_first {
                return Err(InferenceError::BackendError("stub failure".into()));
            }
            Ok(InferenceResult {
                not_infected: 1.0 - self.infected,
                infected: self.infected,
            })
        }
    }

    fn photo() -> CapturedPhoto {
        CapturedPhoto {
            image: RgbImage::from_pixel(450, 680, Rgb([90, 90, 90])),
        }
    }

    fn pipeline(classifier: Box<dyn PatchClassifier>) -> ClassifyPipeline {
        ClassifyPipeline::new(
            PatchExtractor::default(),
            TensorPreprocessor::default(),
            classifier,
        )
    }

    #[test]
    fn test_full_photo_verdict() {
        let verdict = pipeline(StubClassifier::constant(0.8))
            .evaluate(&photo())
            .unwrap();
        assert_eq!(verdict.label, Label::Infected);
        assert_eq!(verdict.per_patch_scores.len(), PATCHES_PER_PHOTO);
    }

    #[test]
    fn test_not_infected_verdict() {
        let verdict = pipeline(StubClassifier::constant(0.1))
            .evaluate(&photo())
            .unwrap();
        assert_eq!(verdict.label, Label::NotInfected);
    }

    #[test]
    fn test_failed_patches_are_excluded() {
        let classifier = Box::new(StubClassifier {
            infected: 0.9,
            fail_first: 5,
            calls: 0,
        });
        let verdict = pipeline(classifier).evaluate(&photo()).unwrap();
        assert_eq!(verdict.per_patch_scores.len(), PATCHES_PER_PHOTO - 5);
        assert_eq!(verdict.label, Label::Infected);
    }

    #[test]
    fn test_all_patches_failing_is_an_error() {
        let classifier = Box::new(StubClassifier {
            infected: 0.9,
            fail_first: PATCHES_PER_PHOTO,
            calls: 0,
        });
        let result = pipeline(classifier).evaluate(&photo());
        assert!(matches!(result, Err(ClassifyError::Aggregation(_))));
    }

    #[test]
    fn test_tiny_photo_fails_extraction() {
        let result = pipeline(StubClassifier::constant(0.5)).evaluate(&CapturedPhoto {
            image: RgbImage::new(10, 10),
        });
        assert!(matches!(result, Err(ClassifyError::Extract(_))));
    }

    #[tokio::test]
    async fn test_async_evaluation() {
        let pipeline = Arc::new(pipeline(StubClassifier::constant(0.7)));
        let verdict = pipeline.evaluate_async(photo()).await.unwrap();
        assert_eq!(verdict.label, Label::Infected);
    }
}
