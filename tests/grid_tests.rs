// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the patch sampling grid

use image::{Rgb, RgbImage};
use patchscan::capture::CapturedPhoto;
use patchscan::classify::PatchExtractor;
use patchscan::constants::{GRID_COLUMNS, GRID_ROWS, PATCHES_PER_PHOTO};
use patchscan::errors::ExtractError;

fn photo(width: u32, height: u32) -> CapturedPhoto {
    CapturedPhoto {
        image: RgbImage::from_pixel(width, height, Rgb([60, 60, 60])),
    }
}

#[test]
fn test_grid_always_yields_thirty_five_patches() {
    let extractor = PatchExtractor::default();
    for (w, h) in [(255, 255), (450, 680), (256, 256), (1920, 1080), (1275, 1785)] {
        let patches = extractor.extract(&photo(w, h)).unwrap();
        assert_eq!(patches.len(), PATCHES_PER_PHOTO, "photo {}x{}", w, h);
    }
}

#[test]
fn test_grid_geometry_on_regular_tiling() {
    // 1275x1785 tiles exactly: steps of 255 in both axes.
    let extractor = PatchExtractor::default();
    let patches = extractor.extract(&photo(1275, 1785)).unwrap();

    for row in 0..GRID_ROWS {
        for column in 0..GRID_COLUMNS {
            let patch = &patches[(row * GRID_COLUMNS + column) as usize];
            assert_eq!(patch.origin_x, column * 255);
            assert_eq!(patch.origin_y, row * 255);
        }
    }
}

#[test]
fn test_patch_pixels_match_source_region() {
    let mut image = RgbImage::from_pixel(1275, 1785, Rgb([0, 0, 0]));
    // Mark the origin of the second patch in the second row.
    image.put_pixel(255, 255, Rgb([200, 10, 10]));

    let patches = PatchExtractor::default()
        .extract(&CapturedPhoto { image })
        .unwrap();
    let patch = &patches[(GRID_COLUMNS + 1) as usize];
    assert_eq!((patch.origin_x, patch.origin_y), (255, 255));
    assert_eq!(patch.pixels.get_pixel(0, 0), &Rgb([200, 10, 10]));
}

#[test]
fn test_minimum_size_photo_degenerates_to_one_origin() {
    // A photo exactly one patch in size: every origin is (0, 0).
    let patches = PatchExtractor::default().extract(&photo(255, 255)).unwrap();
    assert!(patches.iter().all(|p| p.origin_x == 0 && p.origin_y == 0));
    assert_eq!(patches.len(), PATCHES_PER_PHOTO);
}

#[test]
fn test_undersized_photo_is_rejected() {
    let result = PatchExtractor::default().extract(&photo(200, 1000));
    match result {
        Err(ExtractError::ImageTooSmall {
            image_width,
            image_height,
            ..
        }) => {
            assert_eq!((image_width, image_height), (200, 1000));
        }
        other => panic!("expected ImageTooSmall, got {:?}", other),
    }
}
