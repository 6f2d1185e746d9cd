//! Layer model for skin composition.
//!
//! A [`Layer`] is one normalized 64x64 texture plus the metadata that controls
//! how it is painted (visibility, opacity) and where it came from
//! ([`LayerOrigin`]). A [`LayerStack`] orders layers bottom to top: index 0
//! is painted first.
//!
//! # Versioning
//!
//! Every mutation of a stack bumps its [`version`](LayerStack::version). The
//! composite cache compares versions to decide whether a previously rendered
//! composite is still valid.

pub mod composite;
pub mod placeholder;

pub use composite::{CompositeCache, composite, paint_layer};
pub use placeholder::missing_layer_texture;

use serde::{Deserialize, Serialize};

use crate::normalize::{NormalizationKind, Normalized};
use crate::texture::SkinTexture;

// ============================================================================
// Provenance
// ============================================================================

/// Where a layer's pixels came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerOrigin {
    /// Picked from the skin catalog; `source` can be fetched again on load.
    Library { source: String },

    /// Imported by the user. `source` is an optional re-importable location,
    /// kept as metadata only.
    Custom { source: Option<String> },

    /// Placeholder for a layer that could not be resolved.
    ///
    /// `attempted` is the reference that failed, or `None` when the layer
    /// never had a recoverable source (a custom layer saved by reference).
    MissingAsset { attempted: Option<String> },
}

impl LayerOrigin {
    /// The wire tag for this origin.
    pub fn kind(&self) -> LayerKind {
        match self {
            Self::Library { .. } => LayerKind::Library,
            Self::Custom { .. } => LayerKind::Custom,
            Self::MissingAsset { .. } => LayerKind::Error,
        }
    }

    /// The source reference, if any.
    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Library { source } => Some(source),
            Self::Custom { source } => source.as_deref(),
            Self::MissingAsset { attempted } => attempted.as_deref(),
        }
    }

    /// Returns true for placeholder layers.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::MissingAsset { .. })
    }
}

/// Flat provenance tag used in project files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Library,
    Custom,
    Error,
}

// ============================================================================
// Layer
// ============================================================================

/// A single texture contribution to the composite.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub origin: LayerOrigin,
    image: SkinTexture,
    normalization: NormalizationKind,
    pub visible: bool,
    opacity: f32,
    /// Attribution for the artwork (free text or URL).
    pub credits: Option<String>,
}

impl Layer {
    /// Creates a visible, fully opaque layer from a normalization result.
    pub fn new(name: impl Into<String>, origin: LayerOrigin, normalized: Normalized) -> Self {
        Self {
            name: name.into(),
            origin,
            image: normalized.texture,
            normalization: normalized.kind,
            visible: true,
            opacity: 1.0,
            credits: None,
        }
    }

    /// Creates a placeholder layer showing the missing-layer texture.
    pub fn missing(name: impl Into<String>, attempted: Option<String>) -> Self {
        Self {
            name: name.into(),
            origin: LayerOrigin::MissingAsset { attempted },
            image: missing_layer_texture().clone(),
            normalization: NormalizationKind::Modern,
            visible: true,
            opacity: 1.0,
            credits: None,
        }
    }

    /// Sets the attribution.
    pub fn with_credits(mut self, credits: Option<String>) -> Self {
        self.credits = credits;
        self
    }

    /// Sets the opacity, clamped to 0.0-1.0.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.set_opacity(opacity);
        self
    }

    /// Sets visibility.
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// The canonical 64x64 texture.
    pub fn image(&self) -> &SkinTexture {
        &self.image
    }

    /// Which normalization rule produced the texture.
    pub fn normalization(&self) -> NormalizationKind {
        self.normalization
    }

    pub fn kind(&self) -> LayerKind {
        self.origin.kind()
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Sets the opacity, clamped to 0.0-1.0. NaN is treated as 1.0.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_nan() {
            1.0
        } else {
            opacity.clamp(0.0, 1.0)
        };
    }
}

// ============================================================================
// LayerStack
// ============================================================================

/// Ordered layers, bottom (index 0) to top.
///
/// Holds an optional selected index for UI purposes; selection is never
/// serialized.
#[derive(Debug, Clone, Default)]
pub struct LayerStack {
    layers: Vec<Layer>,
    selected: Option<usize>,
    version: u64,
}

impl LayerStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stack from layers in paint order.
    pub fn from_layers(layers: Vec<Layer>) -> Self {
        Self {
            layers,
            selected: None,
            version: 0,
        }
    }

    /// Returns the current version number.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn touch(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    /// Iterates layers in paint order.
    pub fn iter(&self) -> std::slice::Iter<'_, Layer> {
        self.layers.iter()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Consumes the stack, returning its layers in paint order.
    pub fn into_layers(self) -> Vec<Layer> {
        self.layers
    }

    /// Appends a layer on top and returns its index.
    pub fn push(&mut self, layer: Layer) -> usize {
        self.layers.push(layer);
        self.touch();
        self.layers.len() - 1
    }

    /// Inserts a layer at `index` (clamped to the stack length).
    pub fn insert(&mut self, index: usize, layer: Layer) -> usize {
        let index = index.min(self.layers.len());
        self.layers.insert(index, layer);
        if let Some(sel) = self.selected {
            if sel >= index {
                self.selected = Some(sel + 1);
            }
        }
        self.touch();
        index
    }

    /// Removes and returns the layer at `index`.
    ///
    /// Clears the selection if the selected layer was removed.
    pub fn remove(&mut self, index: usize) -> Option<Layer> {
        if index >= self.layers.len() {
            return None;
        }
        let layer = self.layers.remove(index);
        self.selected = match self.selected {
            Some(sel) if sel == index => None,
            Some(sel) if sel > index => Some(sel - 1),
            other => other,
        };
        self.touch();
        Some(layer)
    }

    /// Moves a layer from `from` to `to`, shifting the layers in between.
    ///
    /// Returns false if either index is out of range.
    pub fn move_layer(&mut self, from: usize, to: usize) -> bool {
        let len = self.layers.len();
        if from >= len || to >= len {
            return false;
        }
        if from == to {
            return true;
        }

        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);

        self.selected = self.selected.map(|sel| {
            if sel == from {
                to
            } else if from < sel && sel <= to {
                sel - 1
            } else if to <= sel && sel < from {
                sel + 1
            } else {
                sel
            }
        });
        self.touch();
        true
    }

    /// Moves a layer one step towards the top.
    pub fn move_up(&mut self, index: usize) -> bool {
        index
            .checked_add(1)
            .is_some_and(|up| up < self.layers.len() && self.move_layer(index, up))
    }

    /// Moves a layer one step towards the bottom.
    pub fn move_down(&mut self, index: usize) -> bool {
        index > 0 && self.move_layer(index, index - 1)
    }

    /// Inserts a copy of the layer directly above it. Returns the new index.
    pub fn duplicate(&mut self, index: usize) -> Option<usize> {
        let copy = self.layers.get(index)?.clone();
        Some(self.insert(index + 1, copy))
    }

    /// Sets visibility. Returns true if the state changed.
    pub fn set_visible(&mut self, index: usize, visible: bool) -> bool {
        match self.layers.get_mut(index) {
            Some(layer) if layer.visible != visible => {
                layer.visible = visible;
                self.touch();
                true
            }
            _ => false,
        }
    }

    /// Flips visibility. Returns the new state.
    pub fn toggle_visible(&mut self, index: usize) -> Option<bool> {
        let visible = !self.layers.get(index)?.visible;
        self.set_visible(index, visible);
        Some(visible)
    }

    /// Sets opacity (clamped). Returns true if the value changed.
    pub fn set_opacity(&mut self, index: usize, opacity: f32) -> bool {
        let Some(layer) = self.layers.get_mut(index) else {
            return false;
        };
        let before = layer.opacity();
        layer.set_opacity(opacity);
        if (layer.opacity() - before).abs() > f32::EPSILON {
            self.touch();
            true
        } else {
            false
        }
    }

    /// Renames a layer. Returns false if the index is out of range.
    pub fn rename(&mut self, index: usize, name: impl Into<String>) -> bool {
        match self.layers.get_mut(index) {
            Some(layer) => {
                layer.name = name.into();
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Selects a layer. Out-of-range indices clear the selection.
    pub fn select(&mut self, index: usize) {
        self.selected = (index < self.layers.len()).then_some(index);
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_layer(&self) -> Option<&Layer> {
        self.selected.and_then(|i| self.layers.get(i))
    }

    /// Replaces every layer, clearing the selection.
    pub fn replace_all(&mut self, layers: Vec<Layer>) {
        self.layers = layers;
        self.selected = None;
        self.touch();
    }

    /// Removes every layer.
    pub fn clear(&mut self) {
        self.replace_all(Vec::new());
    }

    /// Iterates the visible layers in paint order.
    pub fn visible_layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|layer| layer.visible)
    }
}

impl<'a> IntoIterator for &'a LayerStack {
    type Item = &'a Layer;
    type IntoIter = std::slice::Iter<'a, Layer>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================
