//! The missing-layer placeholder texture.
//!
//! Rendered once from an embedded SVG using resvg and shared by every
//! placeholder layer (each layer still owns its own copy of the pixels).

use std::sync::OnceLock;

use image::{Rgba, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{Options, Tree};

use crate::texture::{SKIN_SIZE, SkinTexture};

/// Magenta/black checkerboard with a white question mark.
const MISSING_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="64" height="64" viewBox="0 0 64 64">
  <rect width="64" height="64" fill="#000000"/>
  <rect x="0" y="0" width="32" height="32" fill="#f800f8"/>
  <rect x="32" y="32" width="32" height="32" fill="#f800f8"/>
  <path d="M24 22 Q24 14 32 14 Q40 14 40 22 Q40 28 32 30 L32 38" fill="none" stroke="#ffffff" stroke-width="5"/>
  <rect x="29.5" y="43" width="5" height="5" fill="#ffffff"/>
</svg>"##;

const MAGENTA: Rgba<u8> = Rgba([248, 0, 248, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

static MISSING_TEXTURE: OnceLock<SkinTexture> = OnceLock::new();

/// Returns the fixed texture used for layers that could not be resolved.
pub fn missing_layer_texture() -> &'static SkinTexture {
    MISSING_TEXTURE.get_or_init(|| {
        render_svg(MISSING_SVG)
            .and_then(|img| SkinTexture::from_canonical(img).ok())
            .unwrap_or_else(|| {
                tracing::warn!("placeholder SVG failed to render; using plain checkerboard");
                checkerboard()
            })
    })
}

/// Renders an SVG document at 64x64.
fn render_svg(svg_data: &str) -> Option<RgbaImage> {
    let opts = Options::default();
    let tree = Tree::from_str(svg_data, &opts).ok()?;

    let svg_size = tree.size();
    let scale = SKIN_SIZE as f32 / svg_size.width().max(svg_size.height());

    let mut pixmap = Pixmap::new(SKIN_SIZE, SKIN_SIZE)?;
    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    Some(pixmap_to_rgba_image(&pixmap))
}

/// Converts a tiny_skia Pixmap to an image::RgbaImage.
fn pixmap_to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    RgbaImage::from_fn(pixmap.width(), pixmap.height(), |x, y| {
        // tiny_skia stores premultiplied alpha
        pixmap
            .pixel(x, y)
            .map(|p| p.demultiply())
            .map(|c| Rgba([c.red(), c.green(), c.blue(), c.alpha()]))
            .unwrap_or(Rgba([0, 0, 0, 0]))
    })
}

fn checkerboard() -> SkinTexture {
    let mut texture = SkinTexture::transparent();
    let half = SKIN_SIZE / 2;
    for (x, y, pixel) in texture.image_mut().enumerate_pixels_mut() {
        *pixel = if (x < half) == (y < half) { MAGENTA } else { BLACK };
    }
    texture
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_opaque_and_canonical() {
        let texture = missing_layer_texture();
        assert_eq!(texture.as_image().dimensions(), (64, 64));
        assert!(texture.as_image().pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn placeholder_has_magenta_quadrant() {
        let texture = missing_layer_texture();
        let corner = texture.pixel(2, 2);
        assert!(corner[0] > 200 && corner[1] < 40 && corner[2] > 200, "{corner:?}");
        let other = texture.pixel(60, 2);
        assert!(other[0] < 40 && other[2] < 40, "{other:?}");
    }

    #[test]
    fn placeholder_is_stable() {
        assert!(std::ptr::eq(missing_layer_texture(), missing_layer_texture()));
    }

    #[test]
    fn checkerboard_fallback_layout() {
        let board = checkerboard();
        assert_eq!(board.pixel(0, 0), MAGENTA);
        assert_eq!(board.pixel(63, 63), MAGENTA);
        assert_eq!(board.pixel(63, 0), BLACK);
        assert_eq!(board.pixel(0, 63), BLACK);
    }
}
