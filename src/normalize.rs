//! Conversion of arbitrary source images into 64x64 skin textures.
//!
//! Rules are evaluated in order, first match wins:
//!
//! | Source size            | Result                                   | Kind     |
//! |------------------------|------------------------------------------|----------|
//! | 64x32                  | top half copied, bottom half transparent | `Legacy` |
//! | w = 2h, w > 64         | nearest-neighbor resample to 64x64       | `Modern` |
//! | 64x64                  | copied                                   | `Modern` |
//! | anything else          | aspect-preserving fit, centered          | `Fit`    |
//!
//! No smoothing is ever applied; every output pixel is a copy of exactly one
//! source pixel.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::NormalizeError;
use crate::texture::{LEGACY_HEIGHT, RectPx, SKIN_SIZE, SizePx, SkinTexture};

/// Which normalization rule produced a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationKind {
    /// 64x32 pre-1.8 skin padded to 64x64.
    Legacy,
    /// 64x64 skin, or a double-width atlas resampled to 64x64.
    Modern,
    /// Any other size, scaled and centered. Lossy.
    Fit,
}

/// Result of [`normalize`].
#[derive(Debug, Clone)]
pub struct Normalized {
    pub texture: SkinTexture,
    pub kind: NormalizationKind,
    /// Source size before normalization.
    pub source_size: SizePx,
    /// Where the scaled image was placed, for `Fit` results only.
    pub fit: Option<RectPx>,
}

impl Normalized {
    /// Returns the informational message callers should show for a fitted
    /// image, or `None` for exact formats.
    pub fn fit_notice(&self) -> Option<String> {
        self.fit.map(|_| {
            format!(
                "{} is not a standard skin size; it was scaled to fit 64x64",
                self.source_size
            )
        })
    }
}

/// Decodes an encoded image (PNG or any format `image` understands) and
/// normalizes it.
pub fn normalize_bytes(bytes: &[u8]) -> Result<Normalized, NormalizeError> {
    let decoded = image::load_from_memory(bytes)?.to_rgba8();
    normalize(&decoded)
}

/// Normalizes a decoded image into a 64x64 skin texture.
pub fn normalize(source: &RgbaImage) -> Result<Normalized, NormalizeError> {
    let size = SizePx::of(source);
    if size.is_empty() {
        return Err(NormalizeError::EmptyImage(size));
    }

    let (texture, kind, fit) = match (size.width, size.height) {
        (SKIN_SIZE, LEGACY_HEIGHT) => (pad_legacy(source), NormalizationKind::Legacy, None),
        (w, h) if w == 2 * h && w > SKIN_SIZE => (
            resample(source, RectPx::new(0, 0, SKIN_SIZE, SKIN_SIZE)),
            NormalizationKind::Modern,
            None,
        ),
        (SKIN_SIZE, SKIN_SIZE) => (
            resample(source, RectPx::new(0, 0, SKIN_SIZE, SKIN_SIZE)),
            NormalizationKind::Modern,
            None,
        ),
        _ => {
            let placement = fit_rect(size);
            (resample(source, placement), NormalizationKind::Fit, Some(placement))
        }
    };

    tracing::debug!(source = %size, ?kind, "normalized skin image");

    Ok(Normalized {
        texture,
        kind,
        source_size: size,
        fit,
    })
}

/// Copies a 64x32 image into the top half of a transparent canvas.
fn pad_legacy(source: &RgbaImage) -> SkinTexture {
    let mut texture = SkinTexture::transparent();
    let canvas = texture.image_mut();
    for (x, y, pixel) in source.enumerate_pixels() {
        canvas.put_pixel(x, y, *pixel);
    }
    texture
}

/// Computes the centered placement for an image that matches no exact format.
fn fit_rect(size: SizePx) -> RectPx {
    let scale = (SKIN_SIZE as f64 / size.width as f64).min(SKIN_SIZE as f64 / size.height as f64);
    let width = ((size.width as f64 * scale).floor() as u32).clamp(1, SKIN_SIZE);
    let height = ((size.height as f64 * scale).floor() as u32).clamp(1, SKIN_SIZE);
    RectPx::new((SKIN_SIZE - width) / 2, (SKIN_SIZE - height) / 2, width, height)
}

/// Nearest-neighbor resample of the whole source into `target` on a
/// transparent canvas.
fn resample(source: &RgbaImage, target: RectPx) -> SkinTexture {
    let (src_w, src_h) = source.dimensions();
    let mut texture = SkinTexture::transparent();
    let canvas = texture.image_mut();

    for ty in 0..target.height {
        let sy = (ty as u64 * src_h as u64 / target.height as u64) as u32;
        for tx in 0..target.width {
            let sx = (tx as u64 * src_w as u64 / target.width as u64) as u32;
            canvas.put_pixel(target.x + tx, target.y + ty, *source.get_pixel(sx, sy));
        }
    }

    texture
}
