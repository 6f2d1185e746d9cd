//! skinforge: layered Minecraft skin composition
//!
//! This crate normalizes arbitrary PNG images into 64x64 skin textures,
//! stacks them as layers with visibility and opacity, flattens the stack into
//! a final skin, and saves/loads the stack as a versioned project file.
//!
//! # Example
//!
//! ```
//! use image::{Rgba, RgbaImage};
//! use skinforge::{Layer, LayerOrigin, LayerStack, composite, normalize};
//!
//! let base = normalize(&RgbaImage::from_pixel(64, 32, Rgba([200, 150, 100, 255]))).unwrap();
//! let shirt = normalize(&RgbaImage::from_pixel(64, 64, Rgba([0, 0, 255, 255]))).unwrap();
//!
//! let mut stack = LayerStack::new();
//! stack.push(Layer::new("base", LayerOrigin::Custom { source: None }, base));
//! stack.push(Layer::new("shirt", LayerOrigin::Custom { source: None }, shirt).with_opacity(0.5));
//!
//! let skin = composite(&stack);
//! assert_eq!(skin.as_image().dimensions(), (64, 64));
//! ```
//!
//! # Project Files
//!
//! ```
//! use futures::executor::block_on;
//! use skinforge::{ExportMode, LayerStack, MemorySourceLoader, load_project, serialize};
//!
//! let json = serialize(&LayerStack::new(), ExportMode::Reference)
//!     .unwrap()
//!     .to_json()
//!     .unwrap();
//!
//! let load = block_on(load_project(&json, &MemorySourceLoader::new())).unwrap();
//! assert!(load.stack.is_empty());
//! assert!(!load.is_partial());
//! ```

mod catalog;
mod error;
mod layer;
mod normalize;
mod project;
mod studio;
mod texture;

pub use catalog::{CatalogSkin, SkinCatalog};
pub use error::{
    DocumentError, ExportError, Incompatibility, InvalidDocument, NormalizeError, SourceError,
    StudioError,
};
pub use layer::{
    CompositeCache, Layer, LayerKind, LayerOrigin, LayerStack, composite, missing_layer_texture,
    paint_layer,
};
pub use normalize::{NormalizationKind, Normalized, normalize, normalize_bytes};
pub use project::data_uri::{self, DataUriError};
pub use project::{
    CONTENT_VERSION, DirectorySourceLoader, ExportMode, LayerFailure, MIN_SYSTEM_COMPATIBILITY_VERSION,
    MemorySourceLoader, ProjectDocument, ProjectLoad, SYSTEM_COMPATIBILITY_VERSION, SerializedLayer,
    SourceLoader, load_document, load_project, serialize, validate,
};
pub use studio::{
    ExportedSkin, ImportReport, Notice, NoticeLevel, PreviewSink, SkinStudio, StudioConfig,
};
pub use texture::{LEGACY_HEIGHT, RectPx, SKIN_SIZE, SizePx, SkinTexture};
