// SPDX-License-Identifier: GPL-3.0-only

//! Pixel format conversion for the V4L2 backend
//!
//! UVC webcams commonly deliver YUYV or MJPG; the rest of the pipeline
//! works on packed RGB24 only.

use tracing::warn;

/// Convert YUYV (YUV 4:2:2) to packed RGB24
///
/// YUYV format: Y0 U0 Y1 V0 - each 4-byte group encodes 2 pixels.
/// Uses BT.601 coefficients for YUV to RGB conversion.
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixel_count = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);

    // YUYV: Y0 U0 Y1 V0 - processes 2 pixels at a time
    for chunk in data.chunks_exact(4) {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;

        // Convert YUV to RGB (BT.601)
        for y in [y0, y1] {
            let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
            let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
            let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

            rgb.push(r);
            rgb.push(g);
            rgb.push(b);

            if rgb.len() >= pixel_count * 3 {
                break;
            }
        }
    }

    rgb
}

/// Decode an MJPG frame to packed RGB24
///
/// Returns `None` when the buffer is not a decodable JPEG.
pub fn mjpg_to_rgb(data: &[u8]) -> Option<(Vec<u8>, u32, u32)> {
    match image::load_from_memory_with_format(data, image::ImageFormat::Jpeg) {
        Ok(decoded) => {
            let rgb = decoded.to_rgb8();
            let (width, height) = (rgb.width(), rgb.height());
            Some((rgb.into_raw(), width, height))
        }
        Err(e) => {
            warn!(error = %e, "Failed to decode MJPG frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_gray() {
        // Y=128, U=V=128 is mid gray.
        let yuyv = [128u8, 128, 128, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1);
        assert_eq!(rgb.len(), 6);
        for &c in &rgb {
            assert_eq!(c, 128);
        }
    }

    #[test]
    fn test_yuyv_black_and_white() {
        // Y=0 then Y=255, neutral chroma.
        let yuyv = [0u8, 128, 255, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1);
        assert_eq!(&rgb[..3], &[0, 0, 0]);
        assert_eq!(&rgb[3..], &[255, 255, 255]);
    }

    #[test]
    fn test_yuyv_output_length() {
        let yuyv = vec![128u8; 8 * 2 * 2];
        let rgb = yuyv_to_rgb(&yuyv, 8, 2);
        assert_eq!(rgb.len(), 8 * 2 * 3);
    }

    #[test]
    fn test_mjpg_rejects_garbage() {
        assert!(mjpg_to_rgb(&[0u8; 64]).is_none());
    }
}
