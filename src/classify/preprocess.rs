// SPDX-License-Identifier: GPL-3.0-only

//! Patch-to-tensor preprocessing
//!
//! Converts an RGB patch into the float tensor the classifier expects:
//! resized to the model input size if needed, alpha-free, channel
//! values scaled from [0, 255] to [0.0, 1.0].

use image::RgbImage;
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::constants::{MODEL_INPUT_HEIGHT, MODEL_INPUT_WIDTH};
use crate::errors::PreprocessError;

use super::patches::Patch;

/// Memory layout of the produced tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// Height, width, channel (interleaved RGB)
    #[default]
    Nhwc,
    /// Channel, height, width (planar RGB)
    Nchw,
}

/// A dense float32 tensor ready for inference
#[derive(Debug, Clone)]
pub struct InputTensor {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub layout: TensorLayout,
}

impl InputTensor {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Converts patches into normalized model input tensors
#[derive(Debug, Clone)]
pub struct TensorPreprocessor {
    layout: TensorLayout,
}

impl Default for TensorPreprocessor {
    fn default() -> Self {
        Self {
            layout: TensorLayout::Nhwc,
        }
    }
}

impl TensorPreprocessor {
    pub fn new(layout: TensorLayout) -> Self {
        Self { layout }
    }

    /// Produce the normalized tensor for one patch
    ///
    /// Patches already at the model input size pass through without
    /// resampling, so preprocessing is exact for grid patches.
    pub fn preprocess(&self, patch: &Patch) -> Result<InputTensor, PreprocessError> {
        if patch.pixels.as_raw().is_empty() {
            return Err(PreprocessError::NoPixelData);
        }

        let resized;
        let pixels: &RgbImage =
            if patch.width() == MODEL_INPUT_WIDTH && patch.height() == MODEL_INPUT_HEIGHT {
                &patch.pixels
            } else {
                resized = imageops::resize(
                    &patch.pixels,
                    MODEL_INPUT_WIDTH,
                    MODEL_INPUT_HEIGHT,
                    FilterType::Triangle,
                );
                &resized
            };

        let (width, height) = (pixels.width(), pixels.height());
        let pixel_count = (width * height) as usize;
        let mut data = vec![0f32; pixel_count * 3];

        match self.layout {
            TensorLayout::Nhwc => {
                for (i, pixel) in pixels.pixels().enumerate() {
                    data[i * 3] = f32::from(pixel[0]) / 255.0;
                    data[i * 3 + 1] = f32::from(pixel[1]) / 255.0;
                    data[i * 3 + 2] = f32::from(pixel[2]) / 255.0;
                }
            }
            TensorLayout::Nchw => {
                for (i, pixel) in pixels.pixels().enumerate() {
                    data[i] = f32::from(pixel[0]) / 255.0;
                    data[pixel_count + i] = f32::from(pixel[1]) / 255.0;
                    data[2 * pixel_count + i] = f32::from(pixel[2]) / 255.0;
                }
            }
        }

        Ok(InputTensor {
            data,
            width,
            height,
            layout: self.layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MODEL_INPUT_LEN;
    use image::Rgb;

    fn patch(width: u32, height: u32, color: [u8; 3]) -> Patch {
        Patch {
            origin_x: 0,
            origin_y: 0,
            pixels: RgbImage::from_pixel(width, height, Rgb(color)),
        }
    }

    #[test]
    fn test_output_length() {
        let tensor = TensorPreprocessor::default()
            .preprocess(&patch(255, 255, [0, 0, 0]))
            .unwrap();
        assert_eq!(tensor.len(), MODEL_INPUT_LEN);
    }

    #[test]
    fn test_values_scaled_to_unit_range() {
        let tensor = TensorPreprocessor::default()
            .preprocess(&patch(255, 255, [255, 128, 0]))
            .unwrap();
        assert_eq!(tensor.data[0], 1.0);
        assert!((tensor.data[1] - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(tensor.data[2], 0.0);
        assert!(tensor.data.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_undersized_patch_is_resized() {
        let tensor = TensorPreprocessor::default()
            .preprocess(&patch(100, 100, [50, 50, 50]))
            .unwrap();
        assert_eq!((tensor.width, tensor.height), (255, 255));
        assert_eq!(tensor.len(), MODEL_INPUT_LEN);
    }

    #[test]
    fn test_layouts_are_permutations() {
        let mut pixels = RgbImage::from_pixel(255, 255, Rgb([10, 20, 30]));
        pixels.put_pixel(0, 0, Rgb([100, 150, 200]));
        let patch = Patch {
            origin_x: 0,
            origin_y: 0,
            pixels,
        };

        let nhwc = TensorPreprocessor::new(TensorLayout::Nhwc)
            .preprocess(&patch)
            .unwrap();
        let nchw = TensorPreprocessor::new(TensorLayout::Nchw)
            .preprocess(&patch)
            .unwrap();

        let pixel_count = 255 * 255;
        assert_eq!(nhwc.data[0], nchw.data[0]);
        assert_eq!(nhwc.data[1], nchw.data[pixel_count]);
        assert_eq!(nhwc.data[2], nchw.data[2 * pixel_count]);

        let mut nhwc_sorted = nhwc.data.clone();
        let mut nchw_sorted = nchw.data.clone();
        nhwc_sorted.sort_by(f32::total_cmp);
        nchw_sorted.sort_by(f32::total_cmp);
        assert_eq!(nhwc_sorted, nchw_sorted);
    }

    #[test]
    fn test_empty_patch_rejected() {
        let result = TensorPreprocessor::default().preprocess(&Patch {
            origin_x: 0,
            origin_y: 0,
            pixels: RgbImage::new(0, 0),
        });
        assert!(matches!(result, Err(PreprocessError::NoPixelData)));
    }
}
