//! Canonical skin texture types.
//!
//! Every image that enters a layer stack is a [`SkinTexture`]: a 64x64 RGBA
//! buffer. The constructor enforces the size, so a layer can never hold an
//! un-normalized image.

use image::{Rgba, RgbaImage};

/// Edge length of a canonical skin texture, in pixels.
pub const SKIN_SIZE: u32 = 64;

/// Height of a pre-1.8 (legacy) skin texture.
pub const LEGACY_HEIGHT: u32 = 32;

/// A rectangle defined in pixel coordinates.
///
/// Used to describe where a fitted image was placed on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RectPx {
    /// X offset from the left edge of the canvas
    pub x: u32,
    /// Y offset from the top edge of the canvas
    pub y: u32,
    /// Width of the rectangle
    pub width: u32,
    /// Height of the rectangle
    pub height: u32,
}

impl RectPx {
    /// Creates a new rectangle with the given position and dimensions.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Returns the right edge coordinate (x + width).
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Returns the bottom edge coordinate (y + height).
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Returns true if the pixel lies inside the rectangle.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// A 2D size in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizePx {
    pub width: u32,
    pub height: u32,
}

impl SizePx {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &RgbaImage) -> Self {
        Self::new(image.width(), image.height())
    }

    /// Returns true if either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for SizePx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A 64x64 RGBA skin texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinTexture(RgbaImage);

impl SkinTexture {
    /// Creates a fully transparent texture.
    pub fn transparent() -> Self {
        Self(RgbaImage::new(SKIN_SIZE, SKIN_SIZE))
    }

    /// Creates a texture filled with a single color.
    pub fn filled(color: Rgba<u8>) -> Self {
        Self(RgbaImage::from_pixel(SKIN_SIZE, SKIN_SIZE, color))
    }

    /// Wraps an image that is already 64x64.
    ///
    /// Returns the image back if it has any other size; run it through
    /// [`crate::normalize`] first.
    pub fn from_canonical(image: RgbaImage) -> Result<Self, RgbaImage> {
        if image.dimensions() == (SKIN_SIZE, SKIN_SIZE) {
            Ok(Self(image))
        } else {
            Err(image)
        }
    }

    /// Borrows the underlying RGBA buffer.
    pub fn as_image(&self) -> &RgbaImage {
        &self.0
    }

    /// Consumes the texture, returning the RGBA buffer.
    pub fn into_image(self) -> RgbaImage {
        self.0
    }

    /// Returns the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the 64x64 canvas.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.0.get_pixel(x, y)
    }

    /// Returns true if every pixel has zero alpha.
    pub fn is_transparent(&self) -> bool {
        self.0.pixels().all(|p| p[3] == 0)
    }

    pub(crate) fn pixels_mut(&mut self) -> impl Iterator<Item = &mut Rgba<u8>> {
        self.0.pixels_mut()
    }

    pub(crate) fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.0
    }
}

impl Default for SkinTexture {
    fn default() -> Self {
        Self::transparent()
    }
}

impl AsRef<RgbaImage> for SkinTexture {
    fn as_ref(&self) -> &RgbaImage {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_px_edges() {
        let rect = RectPx::new(10, 20, 30, 40);
        assert_eq!(rect.right(), 40);
        assert_eq!(rect.bottom(), 60);
        assert!(rect.contains(10, 20));
        assert!(rect.contains(39, 59));
        assert!(!rect.contains(40, 20));
        assert!(!rect.contains(10, 60));
    }

    #[test]
    fn size_px_display_and_empty() {
        assert_eq!(SizePx::new(64, 32).to_string(), "64x32");
        assert!(SizePx::new(0, 32).is_empty());
        assert!(!SizePx::new(1, 1).is_empty());
    }

    #[test]
    fn canonical_size_is_enforced() {
        assert!(SkinTexture::from_canonical(RgbaImage::new(64, 64)).is_ok());

        let rejected = SkinTexture::from_canonical(RgbaImage::new(64, 32)).unwrap_err();
        assert_eq!(rejected.dimensions(), (64, 32));
    }

    #[test]
    fn transparent_texture() {
        let tex = SkinTexture::transparent();
        assert_eq!(tex.as_image().dimensions(), (SKIN_SIZE, SKIN_SIZE));
        assert!(tex.is_transparent());

        let filled = SkinTexture::filled(Rgba([1, 2, 3, 4]));
        assert!(!filled.is_transparent());
        assert_eq!(filled.pixel(63, 63), Rgba([1, 2, 3, 4]));
    }
}
