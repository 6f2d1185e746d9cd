//! Flattening a layer stack into one texture.

use image::Rgba;

use super::{Layer, LayerStack};
use crate::texture::SkinTexture;

// ============================================================================
// Compositing
// ============================================================================

/// Composites every visible layer of the stack, bottom to top, onto a
/// transparent texture.
///
/// The result depends only on each layer's visibility, opacity and pixels.
/// An empty stack produces a fully transparent texture.
pub fn composite(stack: &LayerStack) -> SkinTexture {
    let mut out = SkinTexture::transparent();
    for layer in stack.visible_layers() {
        paint_layer(&mut out, layer);
    }
    out
}

/// Paints one layer over `dest` using source-over blending, with the layer's
/// opacity applied to its alpha channel.
///
/// Hidden layers leave `dest` untouched.
pub fn paint_layer(dest: &mut SkinTexture, layer: &Layer) {
    if !layer.visible {
        return;
    }
    let opacity = layer.opacity();
    if opacity <= 0.0 {
        return;
    }

    for (dst, src) in dest.pixels_mut().zip(layer.image().as_image().pixels()) {
        *dst = alpha_blend(*src, *dst, opacity);
    }
}

/// Alpha blends two RGBA pixels (source over destination), scaling the
/// source alpha by `opacity`.
fn alpha_blend(src: Rgba<u8>, dst: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0 * opacity;
    if sa <= 0.0 {
        return dst;
    }
    let da = dst[3] as f32 / 255.0;

    let out_a = sa + da * (1.0 - sa);

    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |s: u8, d: u8| -> u8 {
        let sf = s as f32 / 255.0;
        let df = d as f32 / 255.0;
        let out = (sf * sa + df * da * (1.0 - sa)) / out_a;
        (out * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend(src[0], dst[0]),
        blend(src[1], dst[1]),
        blend(src[2], dst[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

// ============================================================================
// CompositeCache
// ============================================================================

/// Holds the most recent composite together with the stack version it was
/// computed from.
#[derive(Debug, Default)]
pub struct CompositeCache {
    entry: Option<(SkinTexture, u64)>,
}

impl CompositeCache {
    /// Returns the cached composite if it was computed from `version`.
    pub fn get(&self, version: u64) -> Option<&SkinTexture> {
        self.entry
            .as_ref()
            .and_then(|(texture, stored)| (*stored == version).then_some(texture))
    }

    /// Stores a composite for `version`.
    pub fn store(&mut self, texture: SkinTexture, version: u64) {
        self.entry = Some((texture, version));
    }

    /// Returns the composite for the stack, recomputing it only if the stack
    /// changed since the last call.
    pub fn get_or_render(&mut self, stack: &LayerStack) -> &SkinTexture {
        let version = stack.version();
        if self.get(version).is_none() {
            self.entry = None;
        }
        &self.entry.get_or_insert_with(|| (composite(stack), version)).0
    }

    /// Drops the cached composite.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

// ============================================================================
// Tests
// ============================================================================
