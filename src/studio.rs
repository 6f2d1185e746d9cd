//! Skin composition session with a layer stack, preview and export.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogSkin;
use crate::error::{ExportError, StudioError};
use crate::layer::{CompositeCache, Layer, LayerOrigin, LayerStack};
use crate::normalize::normalize_bytes;
use crate::project::data_uri::encode_png_bytes;
use crate::project::{ExportMode, LayerFailure, SourceLoader, load_project, serialize};
use crate::texture::SkinTexture;

// ============================================================================
// Configuration
// ============================================================================

/// Session settings.
///
/// # JSON Format
///
/// ```json
/// { "noticeDurationMs": 3000, "defaultExportMode": "embedded" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudioConfig {
    /// How long a notice stays on screen.
    pub notice_duration_ms: u64,

    /// Mode used by [`SkinStudio::export_default_project`].
    pub default_export_mode: ExportMode,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            notice_duration_ms: 3000,
            default_export_mode: ExportMode::Embedded,
        }
    }
}

impl StudioConfig {
    /// Deserializes settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }
}

// ============================================================================
// Notices
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient message for the user. Dismissed after `duration`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub duration: Duration,
    pub posted_at: Instant,
}

impl Notice {
    /// Returns true once `duration` has elapsed since the notice was posted.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.posted_at) >= self.duration
    }
}

// ============================================================================
// Preview
// ============================================================================

/// Receives the flat composite texture, e.g. a 3D skin viewer.
pub trait PreviewSink {
    fn load_texture(&mut self, texture: &SkinTexture);
}

// ============================================================================
// Export artifacts
// ============================================================================

/// A rendered skin ready to save.
#[derive(Debug, Clone)]
pub struct ExportedSkin {
    /// 64x64 RGBA PNG.
    pub png: Vec<u8>,
    /// Attribution of every visible layer that has one, without duplicates.
    pub credits: Vec<String>,
}

/// Summary of a successful project import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub layers: usize,
    pub failures: Vec<LayerFailure>,
    pub unrecoverable: Vec<usize>,
}

impl ImportReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

// ============================================================================
// SkinStudio
// ============================================================================

/// Owns the live layer stack and everything derived from it.
///
/// # Example
///
/// ```
/// use skinforge::{ExportMode, SkinStudio};
///
/// let mut studio = SkinStudio::default();
/// assert!(studio.render().is_transparent());
///
/// let json = studio.export_project(ExportMode::Embedded).unwrap();
/// assert!(json.contains("\"layers\":[]"));
/// ```
pub struct SkinStudio {
    stack: LayerStack,
    composite: CompositeCache,
    preview: Option<Box<dyn PreviewSink>>,
    notices: Vec<Notice>,
    config: StudioConfig,
}

impl Default for SkinStudio {
    fn default() -> Self {
        Self::new(StudioConfig::default())
    }
}

impl SkinStudio {
    pub fn new(config: StudioConfig) -> Self {
        Self {
            stack: LayerStack::new(),
            composite: CompositeCache::default(),
            preview: None,
            notices: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    /// Connects a preview; it receives every rendered composite.
    pub fn attach_preview(&mut self, preview: Box<dyn PreviewSink>) {
        self.preview = Some(preview);
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    /// Mutable access for reordering, toggling and removing layers.
    ///
    /// Drops the cached composite: a replacement stack can reuse the cached
    /// version number.
    pub fn stack_mut(&mut self) -> &mut LayerStack {
        self.composite.invalidate();
        &mut self.stack
    }

    // ------------------------------------------------------------------
    // Adding layers
    // ------------------------------------------------------------------

    /// Imports a user image as a custom layer on top of the stack.
    ///
    /// `source` is an optional re-importable location stored as metadata.
    pub fn import_image(
        &mut self,
        name: impl Into<String>,
        source: Option<String>,
        bytes: &[u8],
    ) -> Result<usize, StudioError> {
        let name = name.into();
        let normalized = match normalize_bytes(bytes) {
            Ok(normalized) => normalized,
            Err(err) => {
                self.notify(NoticeLevel::Error, format!("Could not import {name}: {err}"));
                return Err(err.into());
            }
        };
        if let Some(notice) = normalized.fit_notice() {
            self.notify(NoticeLevel::Info, format!("{name}: {notice}"));
        }

        let layer = Layer::new(name, LayerOrigin::Custom { source }, normalized);
        Ok(self.stack.push(layer))
    }

    /// Fetches a catalog skin and adds it as a library layer on top.
    pub async fn add_library_skin<L>(&mut self, skin: &CatalogSkin, loader: &L) -> Result<usize, StudioError>
    where
        L: SourceLoader + ?Sized,
    {
        let normalized = loader
            .load(&skin.src)
            .await
            .map_err(StudioError::from)
            .and_then(|bytes| normalize_bytes(&bytes).map_err(StudioError::from));
        let normalized = match normalized {
            Ok(normalized) => normalized,
            Err(err) => {
                self.notify(NoticeLevel::Error, format!("Could not load {}: {err}", skin.name));
                return Err(err);
            }
        };
        if let Some(notice) = normalized.fit_notice() {
            self.notify(NoticeLevel::Info, format!("{}: {notice}", skin.name));
        }

        let layer = Layer::new(
            skin.name.clone(),
            LayerOrigin::Library {
                source: skin.src.clone(),
            },
            normalized,
        )
        .with_credits(skin.credits.clone());
        Ok(self.stack.push(layer))
    }

    // ------------------------------------------------------------------
    // Rendering and export
    // ------------------------------------------------------------------

    /// Composites the stack, caches the result and sends it to the preview.
    pub fn render(&mut self) -> &SkinTexture {
        self.composite.invalidate();
        let texture = self.composite.get_or_render(&self.stack);
        if let Some(preview) = self.preview.as_mut() {
            preview.load_texture(texture);
        }
        texture
    }

    /// Encodes the current composite as PNG.
    ///
    /// Reuses the last render if the stack has not changed since.
    pub fn export_png(&mut self) -> Result<ExportedSkin, StudioError> {
        let png = encode_png_bytes(self.composite.get_or_render(&self.stack).as_image())
            .map_err(ExportError::from)?;

        let mut credits: Vec<String> = Vec::new();
        for credit in self.stack.visible_layers().filter_map(|l| l.credits.as_ref()) {
            if !credits.contains(credit) {
                credits.push(credit.clone());
            }
        }
        if !credits.is_empty() {
            self.notify(
                NoticeLevel::Info,
                format!("This skin uses artwork by: {}", credits.join(", ")),
            );
        }

        tracing::info!(bytes = png.len(), credits = credits.len(), "exported skin PNG");
        Ok(ExportedSkin { png, credits })
    }

    /// Serializes the stack as a project file.
    pub fn export_project(&self, mode: ExportMode) -> Result<String, StudioError> {
        let document = serialize(&self.stack, mode)?;
        let json = document.to_json().map_err(ExportError::from)?;
        tracing::info!(?mode, layers = document.layers.len(), "exported project");
        Ok(json)
    }

    /// Serializes the stack using the configured default mode.
    pub fn export_default_project(&self) -> Result<String, StudioError> {
        self.export_project(self.config.default_export_mode)
    }

    /// Replaces the whole stack with the layers of a project file.
    ///
    /// A rejected document leaves the stack untouched. Otherwise the stack is
    /// replaced once every layer has resolved, then rendered and previewed
    /// once. Layers that failed to resolve become placeholders and raise a
    /// partial-import warning.
    ///
    /// Holding `&mut self` for the duration rules out overlapping imports.
    pub async fn import_project<L>(&mut self, json: &str, loader: &L) -> Result<ImportReport, StudioError>
    where
        L: SourceLoader + ?Sized,
    {
        let load = match load_project(json, loader).await {
            Ok(load) => load,
            Err(err) => {
                let message = if err.is_incompatible() {
                    format!("This project was made with an incompatible version: {err}")
                } else {
                    format!("This is not a valid project file: {err}")
                };
                self.notify(NoticeLevel::Error, message);
                return Err(err.into());
            }
        };

        let report = ImportReport {
            layers: load.stack.len(),
            failures: load.failures.clone(),
            unrecoverable: load.unrecoverable.clone(),
        };
        let warning = load.partial_warning();
        let notices = load.notices.clone();

        self.stack.replace_all(load.stack.into_layers());
        self.render();

        self.notify(NoticeLevel::Info, format!("Loaded {} layers", report.layers));
        for notice in notices {
            self.notify(NoticeLevel::Info, notice);
        }
        if let Some(warning) = warning {
            self.notify(NoticeLevel::Warning, warning);
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Notices
    // ------------------------------------------------------------------

    fn notify(&mut self, level: NoticeLevel, message: String) {
        self.notices.push(Notice {
            level,
            message,
            duration: self.config.notice_duration(),
            posted_at: Instant::now(),
        });
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Takes all pending notices.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Drops notices whose display time has run out. Hosts call this from
    /// their UI tick.
    pub fn prune_expired(&mut self, now: Instant) {
        self.notices.retain(|notice| !notice.is_expired(now));
    }
}

// ============================================================================
// Tests
// ============================================================================
