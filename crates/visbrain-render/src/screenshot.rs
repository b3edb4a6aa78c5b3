//! Screenshot functionality: target sizes, cropping and encoding.

#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]

use std::path::Path;
use std::str::FromStr;

use image::{ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Physical unit of a print size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Cm,
    Mm,
    Inch,
    Pixel,
}

impl Unit {
    /// Pixels of one unit at `dpi`.
    pub fn pixels_per_unit(self, dpi: f32) -> f32 {
        match self {
            Self::Cm => dpi / 2.54,
            Self::Mm => dpi / 25.4,
            Self::Inch => dpi,
            Self::Pixel => 1.0,
        }
    }
}

impl FromStr for Unit {
    type Err = ScreenshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cm" | "centimeter" => Ok(Self::Cm),
            "mm" | "millimeter" => Ok(Self::Mm),
            "inch" | "in" => Ok(Self::Inch),
            "pixel" | "px" => Ok(Self::Pixel),
            other => Err(ScreenshotError::InvalidRequest(format!(
                "unknown unit '{other}', use cm, mm, inch or pixel"
            ))),
        }
    }
}

/// How large the rendered image should be.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SizeRequest {
    /// The current canvas size.
    #[default]
    Natural,
    /// A multiple of the current canvas size.
    Factor(f32),
    /// A physical size at a given resolution.
    PrintSize { size: (f32, f32), dpi: f32, unit: Unit },
}

/// Pixel size of the output for a canvas currently `current` pixels large.
///
/// Print sizes keep the canvas aspect ratio: the canvas is scaled by the
/// largest of the two per-axis factors so that both requested dimensions are
/// covered.
pub fn target_size(current: (u32, u32), request: SizeRequest) -> Result<(u32, u32), ScreenshotError> {
    let (cw, ch) = (current.0.max(1) as f32, current.1.max(1) as f32);
    let factor = match request {
        SizeRequest::Natural => 1.0,
        SizeRequest::Factor(f) => f,
        SizeRequest::PrintSize { size, dpi, unit } => {
            if dpi <= 0.0 || size.0 <= 0.0 || size.1 <= 0.0 {
                return Err(ScreenshotError::InvalidRequest(format!(
                    "print size {size:?} at {dpi} dpi must be positive"
                )));
            }
            let ppu = unit.pixels_per_unit(dpi);
            (size.0 * ppu / cw).max(size.1 * ppu / ch)
        }
    };
    if !factor.is_finite() || factor <= 0.0 {
        return Err(ScreenshotError::InvalidRequest(format!("invalid size factor {factor}")));
    }
    Ok((((cw * factor).round() as u32).max(1), ((ch * factor).round() as u32).max(1)))
}

/// Crops `img` to the bounding box of pixels that differ from `background`.
/// An image made only of background is returned unchanged.
pub fn autocrop(img: &RgbaImage, background: Rgba<u8>) -> RgbaImage {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, p) in img.enumerate_pixels() {
        if *p != background {
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
    }
    match bounds {
        Some((x0, y0, x1, y1)) => image::imageops::crop_imm(img, x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image(),
        None => img.clone(),
    }
}

/// Crops `img` to `(x, y, width, height)`, clamped to the image.
pub fn crop_region(img: &RgbaImage, region: (u32, u32, u32, u32)) -> Result<RgbaImage, ScreenshotError> {
    let (x, y, w, h) = region;
    if x >= img.width() || y >= img.height() || w == 0 || h == 0 {
        return Err(ScreenshotError::InvalidRequest(format!(
            "region {region:?} is outside of a {}x{} image",
            img.width(),
            img.height()
        )));
    }
    let w = w.min(img.width() - x);
    let h = h.min(img.height() - y);
    Ok(image::imageops::crop_imm(img, x, y, w, h).to_image())
}

/// Saves an RGBA image. PNG and TIFF keep the alpha channel, JPEG drops it.
pub fn save_image(path: &Path, img: &RgbaImage) -> Result<(), ScreenshotError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "png" => img.save_with_format(path, ImageFormat::Png)?,
        "tif" | "tiff" => img.save_with_format(path, ImageFormat::Tiff)?,
        "jpg" | "jpeg" => {
            // Convert to RGB for JPEG (no alpha)
            let rgb_img = image::DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            rgb_img.save_with_format(path, ImageFormat::Jpeg)?;
        }
        _ => return Err(ScreenshotError::UnsupportedFormat(extension)),
    }
    log::info!("screenshot saved to {} ({}x{})", path.display(), img.width(), img.height());
    Ok(())
}

/// Encodes an RGBA image to PNG in memory.
pub fn save_to_buffer(img: &RgbaImage) -> Result<Vec<u8>, ScreenshotError> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// Error type for screenshot operations.
#[derive(Debug, thiserror::Error)]
pub enum ScreenshotError {
    #[error("Failed to save image: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid screenshot request: {0}")]
    InvalidRequest(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_print_size_cm() {
        let size = target_size(
            (800, 600),
            SizeRequest::PrintSize {
                size: (10.0, 5.0),
                dpi: 300.0,
                unit: Unit::Cm,
            },
        )
        .unwrap();
        assert!((i64::from(size.0) - 1181).abs() <= 1);
        let aspect = size.0 as f32 / size.1 as f32;
        assert!((aspect - 800.0 / 600.0).abs() < 0.01);
    }

    #[test]
    fn test_factor_and_units() {
        assert_eq!(target_size((800, 600), SizeRequest::Factor(2.0)).unwrap(), (1600, 1200));
        assert_eq!(target_size((800, 600), SizeRequest::Natural).unwrap(), (800, 600));
        assert!(target_size((800, 600), SizeRequest::Factor(0.0)).is_err());
        assert_eq!("MM".parse::<Unit>().unwrap(), Unit::Mm);
        assert!("furlong".parse::<Unit>().is_err());
        assert!((Unit::Inch.pixels_per_unit(300.0) - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_autocrop() {
        let bg = Rgba([0, 0, 0, 255]);
        let mut img = RgbaImage::from_pixel(10, 10, bg);
        img.put_pixel(2, 3, Rgba([255, 0, 0, 255]));
        img.put_pixel(5, 7, Rgba([0, 255, 0, 255]));
        let cropped = autocrop(&img, bg);
        assert_eq!(cropped.dimensions(), (4, 5));
        assert_eq!(*cropped.get_pixel(0, 0), Rgba([255, 0, 0, 255]));

        let empty = RgbaImage::from_pixel(4, 4, bg);
        assert_eq!(autocrop(&empty, bg).dimensions(), (4, 4));
    }

    #[test]
    fn test_crop_region() {
        let img = RgbaImage::new(10, 10);
        assert_eq!(crop_region(&img, (8, 8, 5, 5)).unwrap().dimensions(), (2, 2));
        assert!(crop_region(&img, (10, 0, 1, 1)).is_err());
    }

    #[test]
    fn test_save_formats() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 128]));
        for name in ["a.png", "a.tiff", "a.jpg"] {
            save_image(&dir.path().join(name), &img).unwrap();
        }
        let png = image::open(dir.path().join("a.png")).unwrap();
        assert!(png.color().has_alpha());
        let jpg = image::open(dir.path().join("a.jpg")).unwrap();
        assert!(!jpg.color().has_alpha());
        assert!(matches!(
            save_image(&dir.path().join("a.bmpx"), &img),
            Err(ScreenshotError::UnsupportedFormat(_))
        ));
        assert!(!save_to_buffer(&img).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_print_size_covers_request(
            cw in 100_u32..2000,
            ch in 100_u32..2000,
            pw in 1.0_f32..30.0,
            ph in 1.0_f32..30.0,
            dpi in 72.0_f32..600.0,
        ) {
            let request = SizeRequest::PrintSize { size: (pw, ph), dpi, unit: Unit::Cm };
            let (w, h) = target_size((cw, ch), request).unwrap();
            let ppu = Unit::Cm.pixels_per_unit(dpi);
            prop_assert!(w as f32 >= pw * ppu - 1.0);
            prop_assert!(h as f32 >= ph * ppu - 1.0);
            let expected = cw as f32 / ch as f32;
            prop_assert!(((w as f32 / h as f32) / expected - 1.0).abs() < 0.05);
        }
    }
}
