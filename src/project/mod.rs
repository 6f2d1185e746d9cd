//! Project files: the layer stack in a reloadable, versioned JSON document.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "exportType": "embedded",
//!   "systemCompatibilityVersion": 1,
//!   "contentVersion": 1,
//!   "layers": [
//!     {
//!       "name": "Base",
//!       "type": "library",
//!       "opacity": 1.0,
//!       "visible": true,
//!       "credits": "https://example.com/artist",
//!       "src": "skins/base.png",
//!       "imgData": "data:image/png;base64,..."
//!     }
//!   ]
//! }
//! ```
//!
//! `embedded` documents carry every layer's pixels and load offline.
//! `reference` documents carry only catalog locations; user-imported layers
//! lose their pixels.
//!
//! # Example
//!
//! ```
//! use skinforge::{ExportMode, LayerStack, ProjectDocument, serialize};
//!
//! let stack = LayerStack::new();
//! let json = serialize(&stack, ExportMode::Embedded).unwrap().to_json().unwrap();
//! let restored = ProjectDocument::from_json(&json).unwrap();
//! assert!(restored.layers.is_empty());
//! ```

pub mod data_uri;
pub mod load;
pub mod source;

pub use load::{LayerFailure, ProjectLoad, load_document, load_project, validate};
pub use source::{DirectorySourceLoader, MemorySourceLoader, SourceLoader};

use serde::{Deserialize, Serialize};

use crate::error::{DocumentError, ExportError};
use crate::layer::{Layer, LayerKind, LayerOrigin, LayerStack};

/// Bumped only on breaking format changes.
pub const SYSTEM_COMPATIBILITY_VERSION: u32 = 1;

/// Oldest compatibility version this build can still read.
pub const MIN_SYSTEM_COMPATIBILITY_VERSION: u32 = 1;

/// Bumped on any structural addition. Informational for readers.
pub const CONTENT_VERSION: u32 = 1;

// ============================================================================
// Document types
// ============================================================================

/// How layer images are stored in a project file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Every layer carries its pixels as a PNG data URI.
    #[default]
    Embedded,
    /// Catalog layers carry only their source reference.
    Reference,
}

impl std::str::FromStr for ExportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "embedded" => Ok(Self::Embedded),
            "reference" => Ok(Self::Reference),
            other => Err(format!("unknown export mode `{other}`")),
        }
    }
}

/// One layer as stored in a project file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct SerializedLayer {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: LayerKind,

    #[serde(default = "default_opacity")]
    pub opacity: f32,

    #[serde(default = "default_true")]
    pub visible: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<String>,

    /// Source reference; written as `null` when there is none.
    #[serde(default)]
    pub src: Option<String>,

    /// PNG data URI, embedded mode only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_data: Option<String>,
}

fn default_opacity() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

/// A versioned project file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    pub export_type: ExportMode,
    pub system_compatibility_version: u32,
    #[serde(default)]
    pub content_version: u32,
    pub layers: Vec<SerializedLayer>,
}

impl ProjectDocument {
    /// Creates an empty document stamped with this build's versions.
    pub fn new(export_type: ExportMode) -> Self {
        Self {
            export_type,
            system_compatibility_version: SYSTEM_COMPATIBILITY_VERSION,
            content_version: CONTENT_VERSION,
            layers: Vec::new(),
        }
    }

    /// Serializes the document to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serializes the document to a pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses and validates a document. See [`validate`] for the checks.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        validate(json)
    }
}

// ============================================================================
// Serializer
// ============================================================================

/// Converts a layer stack into a project document.
///
/// Only embedded mode can fail, when a layer image cannot be PNG-encoded.
pub fn serialize(stack: &LayerStack, mode: ExportMode) -> Result<ProjectDocument, ExportError> {
    let mut document = ProjectDocument::new(mode);
    document.layers = stack
        .iter()
        .map(|layer| serialize_layer(layer, mode))
        .collect::<Result<_, _>>()?;

    tracing::debug!(?mode, layers = document.layers.len(), "serialized project");
    Ok(document)
}

fn serialize_layer(layer: &Layer, mode: ExportMode) -> Result<SerializedLayer, ExportError> {
    let (src, img_data) = match mode {
        ExportMode::Embedded => (
            layer.origin.source().map(str::to_string),
            Some(data_uri::encode_png(layer.image().as_image())?),
        ),
        ExportMode::Reference => match &layer.origin {
            LayerOrigin::Custom { .. } => (None, None),
            origin => (origin.source().map(str::to_string), None),
        },
    };

    Ok(SerializedLayer {
        name: layer.name.clone(),
        kind: layer.kind(),
        opacity: layer.opacity(),
        visible: layer.visible,
        credits: layer.credits.clone(),
        src,
        img_data,
    })
}

// ============================================================================
// Tests
// ============================================================================
