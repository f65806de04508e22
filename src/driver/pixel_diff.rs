//! Pixel difference between two screenshots.

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};

/// Per-channel delta below which two pixels are considered equal
const CHANNEL_TOLERANCE: i32 = 5;

/// Percentage (0.0 - 100.0) of pixels that differ between two PNG buffers
pub fn difference_percent(current: &[u8], baseline: &[u8]) -> Result<f64> {
    let current = image::load_from_memory(current).context("Failed to decode current screenshot")?;
    let baseline =
        image::load_from_memory(baseline).context("Failed to decode baseline screenshot")?;
    Ok(compare_images(&current, &baseline))
}

/// Percentage of differing pixels; mismatched dimensions count as 100%
pub fn compare_images(current: &DynamicImage, baseline: &DynamicImage) -> f64 {
    if current.dimensions() != baseline.dimensions() {
        return 100.0;
    }

    let (width, height) = current.dimensions();
    let total_pixels = width as u64 * height as u64;
    if total_pixels == 0 {
        return 0.0;
    }

    let mut diff_pixels = 0u64;
    for (x, y, c1) in current.pixels() {
        let c2 = baseline.get_pixel(x, y);
        let differs =
            c1.0.iter()
                .zip(c2.0.iter())
                .any(|(a, b)| (*a as i32 - *b as i32).abs() > CHANNEL_TOLERANCE);
        if differs {
            diff_pixels += 1;
        }
    }

    (diff_pixels as f64 / total_pixels as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png(img: RgbaImage) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_identical_images() {
        let a = png(RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255])));
        assert_eq!(difference_percent(&a, &a).unwrap(), 0.0);
    }

    #[test]
    fn test_quarter_changed() {
        let base = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        let mut changed = base.clone();
        changed.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let pct = difference_percent(&png(changed), &png(base)).unwrap();
        assert!((pct - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_small_channel_noise_is_ignored() {
        let base = RgbaImage::from_pixel(2, 2, Rgba([100, 100, 100, 255]));
        let noisy = RgbaImage::from_pixel(2, 2, Rgba([103, 98, 100, 255]));
        assert_eq!(difference_percent(&png(noisy), &png(base)).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch_is_full_difference() {
        let a = png(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])));
        let b = png(RgbaImage::from_pixel(3, 2, Rgba([0, 0, 0, 255])));
        assert_eq!(difference_percent(&a, &b).unwrap(), 100.0);
    }
}
