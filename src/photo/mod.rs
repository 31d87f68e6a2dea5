// SPDX-License-Identifier: GPL-3.0-only

//! Still-photo processing
//!
//! Turns a raw sensor photo into the upright, cropped image the
//! classifier consumes. The crop rectangle is anchored to the image
//! center and shifted by fixed offsets so it lands on the region the
//! on-screen guide window covers.

use image::RgbImage;
use image::imageops;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capture::types::{CapturedPhoto, RawPhoto, Rotation};
use crate::constants::{CROP_HEIGHT, CROP_OFFSET_X, CROP_OFFSET_Y, CROP_WIDTH};
use crate::errors::ProcessError;

/// Center-relative crop rectangle
///
/// The crop origin is the centered position of a `width` x `height`
/// rectangle, shifted by the signed offsets. Offsets may push the
/// rectangle out of bounds on small sources; that is a hard error, not
/// a clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropGeometry {
    pub width: u32,
    pub height: u32,
    pub offset_x: i64,
    pub offset_y: i64,
}

impl Default for CropGeometry {
    fn default() -> Self {
        Self {
            width: CROP_WIDTH,
            height: CROP_HEIGHT,
            offset_x: CROP_OFFSET_X,
            offset_y: CROP_OFFSET_Y,
        }
    }
}

impl CropGeometry {
    /// Top-left corner of the crop for a source of the given size
    ///
    /// Signed arithmetic; the caller validates bounds.
    pub fn origin(&self, source_width: u32, source_height: u32) -> (i64, i64) {
        let x = (i64::from(source_width) - i64::from(self.width)) / 2 + self.offset_x;
        let y = (i64::from(source_height) - i64::from(self.height)) / 2 + self.offset_y;
        (x, y)
    }
}

/// Orientation normalization and fixed cropping for still photos
#[derive(Debug, Clone, Default)]
pub struct StillPhotoPipeline {
    crop: CropGeometry,
}

impl StillPhotoPipeline {
    pub fn new(crop: CropGeometry) -> Self {
        Self { crop }
    }

    pub fn crop_geometry(&self) -> CropGeometry {
        self.crop
    }

    /// Normalize orientation, then apply the fixed center-relative crop
    ///
    /// Deterministic: the same raw photo always yields the same output.
    pub fn process(&self, photo: RawPhoto) -> Result<CapturedPhoto, ProcessError> {
        if photo.image.width() == 0 || photo.image.height() == 0 {
            return Err(ProcessError::InvalidPhoto("empty image".into()));
        }

        let upright = Self::normalize_orientation(photo.image, photo.orientation);
        let (width, height) = (upright.width(), upright.height());
        let (crop_x, crop_y) = self.crop.origin(width, height);

        let fits = crop_x >= 0
            && crop_y >= 0
            && crop_x + i64::from(self.crop.width) <= i64::from(width)
            && crop_y + i64::from(self.crop.height) <= i64::from(height);
        if !fits {
            return Err(ProcessError::CropOutOfBounds {
                image_width: width,
                image_height: height,
                crop_x,
                crop_y,
                crop_width: self.crop.width,
                crop_height: self.crop.height,
            });
        }

        debug!(
            crop_x,
            crop_y,
            crop_width = self.crop.width,
            crop_height = self.crop.height,
            "Cropping still photo"
        );

        let image = imageops::crop_imm(
            &upright,
            crop_x as u32,
            crop_y as u32,
            self.crop.width,
            self.crop.height,
        )
        .to_image();

        Ok(CapturedPhoto { image })
    }

    fn normalize_orientation(image: RgbImage, orientation: Rotation) -> RgbImage {
        match orientation {
            Rotation::None => image,
            Rotation::Rotate90 => imageops::rotate90(&image),
            Rotation::Rotate180 => imageops::rotate180(&image),
            Rotation::Rotate270 => imageops::rotate270(&image),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([40, 80, 120]))
    }

    #[test]
    fn test_default_crop_origin() {
        let crop = CropGeometry::default();
        // 1280x1600 upright source with the fixed 450x680 crop.
        assert_eq!(crop.origin(1280, 1600), (110, 557));
    }

    #[test]
    fn test_crop_lands_on_marker() {
        let mut image = solid(1280, 1600);
        image.put_pixel(110, 557, Rgb([255, 0, 0]));

        let pipeline = StillPhotoPipeline::default();
        let photo = pipeline
            .process(RawPhoto {
                image,
                orientation: Rotation::None,
            })
            .unwrap();

        assert_eq!(photo.width(), 450);
        assert_eq!(photo.height(), 680);
        assert_eq!(photo.image.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_orientation_swaps_dimensions() {
        // 1600x1280 sensor frame tagged for 270 degree correction.
        let pipeline = StillPhotoPipeline::default();
        let photo = pipeline
            .process(RawPhoto {
                image: solid(1600, 1280),
                orientation: Rotation::Rotate270,
            })
            .unwrap();
        assert_eq!((photo.width(), photo.height()), (450, 680));
    }

    #[test]
    fn test_deterministic() {
        let pipeline = StillPhotoPipeline::default();
        let raw = RawPhoto {
            image: solid(1280, 1600),
            orientation: Rotation::None,
        };
        let a = pipeline.process(raw.clone()).unwrap();
        let b = pipeline.process(raw).unwrap();
        assert_eq!(a.image.as_raw(), b.image.as_raw());
    }

    #[test]
    fn test_crop_out_of_bounds_is_an_error() {
        let pipeline = StillPhotoPipeline::default();
        let result = pipeline.process(RawPhoto {
            image: solid(500, 700),
            orientation: Rotation::None,
        });

        match result {
            Err(ProcessError::CropOutOfBounds { crop_x, crop_y, .. }) => {
                // (500-450)/2 - 305 = -280
                assert_eq!(crop_x, -280);
                assert_eq!(crop_y, 107);
            }
            other => panic!("expected CropOutOfBounds, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_photo_rejected() {
        let pipeline = StillPhotoPipeline::default();
        let result = pipeline.process(RawPhoto {
            image: RgbImage::new(0, 0),
            orientation: Rotation::None,
        });
        assert!(matches!(result, Err(ProcessError::InvalidPhoto(_))));
    }

    #[test]
    fn test_custom_geometry() {
        let pipeline = StillPhotoPipeline::new(CropGeometry {
            width: 4,
            height: 4,
            offset_x: 0,
            offset_y: 0,
        });
        let photo = pipeline
            .process(RawPhoto {
                image: solid(16, 16),
                orientation: Rotation::None,
            })
            .unwrap();
        assert_eq!((photo.width(), photo.height()), (4, 4));
    }
}
