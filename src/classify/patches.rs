// SPDX-License-Identifier: GPL-3.0-only

//! Patch grid extraction
//!
//! Tiles a cropped photo into a fixed 5x7 grid of classifier-sized
//! patches. Origins are spaced by integer division of the leftover
//! span, so patches overlap on small photos and the far edge may be
//! slightly undersampled when the span does not divide evenly. The
//! grid is deterministic and row-major: all columns of row 0, then
//! row 1, and so on.

use image::RgbImage;
use image::imageops;
use tracing::debug;

use crate::capture::types::CapturedPhoto;
use crate::constants::{
    GRID_COLUMNS, GRID_ROWS, HORIZONTAL_STEPS, PATCH_HEIGHT, PATCH_WIDTH, VERTICAL_STEPS,
};
use crate::errors::ExtractError;

/// One patch cut from a photo, with its grid origin
#[derive(Debug, Clone)]
pub struct Patch {
    pub origin_x: u32,
    pub origin_y: u32,
    pub pixels: RgbImage,
}

impl Patch {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Extracts the fixed sampling grid from a photo
#[derive(Debug, Clone)]
pub struct PatchExtractor {
    patch_width: u32,
    patch_height: u32,
}

impl Default for PatchExtractor {
    fn default() -> Self {
        Self::new(PATCH_WIDTH, PATCH_HEIGHT)
    }
}

impl PatchExtractor {
    /// An extractor producing patches of the given size
    pub fn new(patch_width: u32, patch_height: u32) -> Self {
        Self {
            patch_width,
            patch_height,
        }
    }

    /// Cut the full grid out of the photo, row-major
    ///
    /// Every patch is exactly `patch_width` x `patch_height`; a photo
    /// smaller than one patch in either dimension is an error.
    pub fn extract(&self, photo: &CapturedPhoto) -> Result<Vec<Patch>, ExtractError> {
        let (width, height) = (photo.width(), photo.height());
        if width < self.patch_width || height < self.patch_height {
            return Err(ExtractError::ImageTooSmall {
                image_width: width,
                image_height: height,
                patch_width: self.patch_width,
                patch_height: self.patch_height,
            });
        }

        // Integer steps; any remainder is left unsampled at the far edge.
        let step_x = (width - self.patch_width) / HORIZONTAL_STEPS;
        let step_y = (height - self.patch_height) / VERTICAL_STEPS;

        debug!(width, height, step_x, step_y, "Extracting patch grid");

        let mut patches = Vec::with_capacity((GRID_COLUMNS * GRID_ROWS) as usize);
        for row in 0..GRID_ROWS {
            for column in 0..GRID_COLUMNS {
                let origin_x = column * step_x;
                let origin_y = row * step_y;
                let pixels = imageops::crop_imm(
                    &photo.image,
                    origin_x,
                    origin_y,
                    self.patch_width,
                    self.patch_height,
                )
                .to_image();
                patches.push(Patch {
                    origin_x,
                    origin_y,
                    pixels,
                });
            }
        }

        Ok(patches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PATCHES_PER_PHOTO;
    use image::Rgb;

    fn photo(width: u32, height: u32) -> CapturedPhoto {
        CapturedPhoto {
            image: RgbImage::from_pixel(width, height, Rgb([10, 20, 30])),
        }
    }

    #[test]
    fn test_grid_size_is_fixed() {
        let extractor = PatchExtractor::default();
        for (w, h) in [(255, 255), (450, 680), (1275, 1785), (300, 900)] {
            let patches = extractor.extract(&photo(w, h)).unwrap();
            assert_eq!(patches.len(), PATCHES_PER_PHOTO, "{}x{}", w, h);
        }
    }

    #[test]
    fn test_first_patch_at_origin() {
        let extractor = PatchExtractor::default();
        let patches = extractor.extract(&photo(450, 680)).unwrap();
        assert_eq!((patches[0].origin_x, patches[0].origin_y), (0, 0));
    }

    #[test]
    fn test_row_major_order() {
        let extractor = PatchExtractor::default();
        let patches = extractor.extract(&photo(450, 680)).unwrap();
        // Row 0 spans indices 0..5 with constant y.
        let row0_y = patches[0].origin_y;
        assert!(patches[..5].iter().all(|p| p.origin_y == row0_y));
        // Index 5 starts row 1 back at x=0.
        assert_eq!(patches[5].origin_x, 0);
        assert!(patches[5].origin_y > row0_y);
    }

    #[test]
    fn test_exact_tiling_reaches_far_edge() {
        // 1275 = 255 + 4*255, 1785 = 255 + 6*255: steps divide evenly.
        let extractor = PatchExtractor::default();
        let patches = extractor.extract(&photo(1275, 1785)).unwrap();
        let last = patches.last().unwrap();
        assert_eq!(last.origin_x + last.width(), 1275);
        assert_eq!(last.origin_y + last.height(), 1785);
    }

    #[test]
    fn test_overlapping_grid_on_small_photo() {
        // The default 450x680 crop: steps of 48 and 70, heavy overlap.
        let extractor = PatchExtractor::default();
        let patches = extractor.extract(&photo(450, 680)).unwrap();
        assert_eq!(patches[1].origin_x, 48);
        assert_eq!(patches[5].origin_y, 70);
        for p in &patches {
            assert_eq!((p.width(), p.height()), (255, 255));
        }
    }

    #[test]
    fn test_remainder_left_unsampled() {
        // 460 - 255 = 205, 205 / 4 = 51 with remainder 1: the last
        // column ends one pixel short of the edge.
        let extractor = PatchExtractor::default();
        let patches = extractor.extract(&photo(460, 680)).unwrap();
        let last_in_row = &patches[4];
        assert_eq!(last_in_row.origin_x + last_in_row.width(), 459);
    }

    #[test]
    fn test_custom_patch_size() {
        // 500 - 100 = 400, step 100: the 100x100 grid tiles exactly.
        let extractor = PatchExtractor::new(100, 100);
        let patches = extractor.extract(&photo(500, 700)).unwrap();
        assert_eq!(patches.len(), PATCHES_PER_PHOTO);
        for p in &patches {
            assert_eq!((p.width(), p.height()), (100, 100));
        }
        let last = patches.last().unwrap();
        assert_eq!(last.origin_x + last.width(), 500);
        assert_eq!(last.origin_y + last.height(), 700);
    }

    #[test]
    fn test_too_small_photo_is_an_error() {
        let extractor = PatchExtractor::default();
        let result = extractor.extract(&photo(254, 680));
        assert!(matches!(result, Err(ExtractError::ImageTooSmall { .. })));
    }
}
