//! Error types.
//!
//! Document-level errors abort an import before anything is mutated.
//! Per-layer errors ([`SourceError`], [`NormalizeError`] during a load) are
//! recovered locally by substituting the missing-layer placeholder.

use crate::texture::SizePx;

/// Failure to turn a source image into a skin texture.
#[derive(thiserror::Error, Debug)]
pub enum NormalizeError {
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image has no pixels ({0})")]
    EmptyImage(SizePx),
}

/// Why a project document was rejected.
#[derive(thiserror::Error, Debug)]
pub enum DocumentError {
    #[error("invalid project file: {0}")]
    Invalid(#[from] InvalidDocument),

    #[error("incompatible project file: {0}")]
    Incompatible(#[from] Incompatibility),
}

impl DocumentError {
    /// Returns true for version mismatches, as opposed to malformed input.
    pub fn is_incompatible(&self) -> bool {
        matches!(self, Self::Incompatible(_))
    }
}

/// Shape errors in a project document.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum InvalidDocument {
    #[error("not a JSON object: {0}")]
    Malformed(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("`layers` is not a list")]
    LayersNotSequence,

    #[error("bad value at `{path}`: {message}")]
    Schema { path: String, message: String },
}

/// Version range errors in a project document.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Incompatibility {
    #[error("no systemCompatibilityVersion")]
    Missing,

    #[error("systemCompatibilityVersion is not an integer")]
    NotAnInteger,

    #[error("version {found} is older than the oldest supported version {minimum}")]
    TooOld { found: i64, minimum: u32 },

    #[error("version {found} is from the future (this build supports up to {supported})")]
    FromFuture { found: i64, supported: u32 },
}

/// Failure to fetch the bytes behind a layer's source reference.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("source `{0}` not found")]
    NotFound(String),

    #[error("source `{reference}` rejected: {reason}")]
    Rejected {
        reference: String,
        reason: &'static str,
    },

    #[error("reading `{reference}` failed: {source}")]
    Io {
        reference: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to produce an export artifact.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("could not encode PNG: {0}")]
    Encode(#[from] image::ImageError),

    #[error("could not write project JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Any error surfaced by [`crate::SkinStudio`].
#[derive(thiserror::Error, Debug)]
pub enum StudioError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
