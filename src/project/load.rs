//! Loading project files back into a layer stack.
//!
//! Loading happens in two steps:
//!
//! 1. [`validate`] checks the document shape and version range. Any failure
//!    here rejects the whole document.
//! 2. [`load_document`] resolves every layer concurrently. A layer that
//!    cannot be resolved is replaced by the missing-layer placeholder and
//!    reported, but never aborts the load.

use futures::future::join_all;
use serde_json::{Map, Value};

use super::data_uri;
use super::source::SourceLoader;
use super::{
    CONTENT_VERSION, ExportMode, MIN_SYSTEM_COMPATIBILITY_VERSION, ProjectDocument,
    SYSTEM_COMPATIBILITY_VERSION, SerializedLayer,
};
use crate::error::{DocumentError, Incompatibility, InvalidDocument};
use crate::layer::{Layer, LayerKind, LayerOrigin, LayerStack};
use crate::normalize::{Normalized, normalize, normalize_bytes};

// ============================================================================
// Validation
// ============================================================================

/// Parses a project file, checking in order:
///
/// 1. the text is a JSON object,
/// 2. `systemCompatibilityVersion` is present and within the supported range,
/// 3. `exportType` is present and `layers` is a list,
/// 4. every field has the right type.
///
/// `contentVersion` is informational and never causes a rejection.
pub fn validate(json: &str) -> Result<ProjectDocument, DocumentError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| InvalidDocument::Malformed(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(InvalidDocument::Malformed("top level is not an object".into()).into());
    };

    let system_compatibility_version = check_compatibility(map.get("systemCompatibilityVersion"))?;
    let Shape {
        export_type,
        content_version,
        layers,
    } = decode_shape(map)?;

    Ok(ProjectDocument {
        export_type,
        system_compatibility_version,
        content_version,
        layers,
    })
}

fn check_compatibility(field: Option<&Value>) -> Result<u32, Incompatibility> {
    let found = match field {
        None | Some(Value::Null) => return Err(Incompatibility::Missing),
        Some(value) => value.as_i64().ok_or(Incompatibility::NotAnInteger)?,
    };
    check_version(found)
}

fn check_version(found: i64) -> Result<u32, Incompatibility> {
    if found < MIN_SYSTEM_COMPATIBILITY_VERSION as i64 {
        return Err(Incompatibility::TooOld {
            found,
            minimum: MIN_SYSTEM_COMPATIBILITY_VERSION,
        });
    }
    if found > SYSTEM_COMPATIBILITY_VERSION as i64 {
        return Err(Incompatibility::FromFuture {
            found,
            supported: SYSTEM_COMPATIBILITY_VERSION,
        });
    }
    Ok(found as u32)
}

struct Shape {
    export_type: ExportMode,
    content_version: u32,
    layers: Vec<SerializedLayer>,
}

fn decode_shape(mut map: Map<String, Value>) -> Result<Shape, InvalidDocument> {
    let export_type = match map.remove("exportType") {
        None | Some(Value::Null) => return Err(InvalidDocument::MissingField("exportType")),
        Some(value) => serde_json::from_value::<ExportMode>(value).map_err(|e| InvalidDocument::Schema {
            path: "exportType".into(),
            message: e.to_string(),
        })?,
    };

    let Some(Value::Array(raw_layers)) = map.remove("layers") else {
        return Err(InvalidDocument::LayersNotSequence);
    };

    let layers = raw_layers
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            serde_json::from_value::<SerializedLayer>(raw).map_err(|e| InvalidDocument::Schema {
                path: format!("layers[{index}]"),
                message: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let content_version = map
        .get("contentVersion")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0);
    if content_version > CONTENT_VERSION {
        tracing::info!(
            content_version,
            supported = CONTENT_VERSION,
            "project written by a newer build; unknown fields are ignored"
        );
    }

    Ok(Shape {
        export_type,
        content_version,
        layers,
    })
}

// ============================================================================
// Resolution
// ============================================================================

/// A layer that could not be restored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerFailure {
    pub index: usize,
    pub name: String,
    pub reason: String,
}

/// Outcome of loading a project.
#[derive(Debug)]
pub struct ProjectLoad {
    /// Restored layers, in document order.
    pub stack: LayerStack,
    pub export_type: ExportMode,
    pub content_version: u32,
    /// Layers whose source failed to resolve; each was replaced by the
    /// placeholder.
    pub failures: Vec<LayerFailure>,
    /// Layers saved without recoverable pixels (custom layers in a
    /// reference-mode file). Expected, so not counted as failures.
    pub unrecoverable: Vec<usize>,
    /// Informational messages for layers that had to be fitted.
    pub notices: Vec<String>,
}

impl ProjectLoad {
    /// True if any layer failed to resolve.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Summary warning for a partial import.
    pub fn partial_warning(&self) -> Option<String> {
        if !self.is_partial() {
            return None;
        }
        let names: Vec<&str> = self.failures.iter().map(|f| f.name.as_str()).collect();
        Some(format!(
            "{} of {} layers could not be loaded and were replaced by placeholders: {}",
            self.failures.len(),
            self.stack.len(),
            names.join(", ")
        ))
    }
}

enum Outcome {
    Resolved(Option<String>),
    Failed(String),
    Unrecoverable,
}

/// Validates and loads a project file.
#[tracing::instrument(skip_all)]
pub async fn load_project<L>(json: &str, loader: &L) -> Result<ProjectLoad, DocumentError>
where
    L: SourceLoader + ?Sized,
{
    let document = validate(json)?;
    load_document(&document, loader).await
}

/// Resolves every layer of an already-parsed document.
///
/// Layers resolve concurrently; the resulting stack always follows document
/// order. Only the version check can fail.
#[tracing::instrument(skip_all, fields(mode = ?document.export_type, layers = document.layers.len()))]
pub async fn load_document<L>(
    document: &ProjectDocument,
    loader: &L,
) -> Result<ProjectLoad, DocumentError>
where
    L: SourceLoader + ?Sized,
{
    check_version(document.system_compatibility_version as i64)?;

    let mode = document.export_type;
    let resolved = join_all(
        document
            .layers
            .iter()
            .map(|layer| resolve_layer(layer, mode, loader)),
    )
    .await;

    let mut layers = Vec::with_capacity(resolved.len());
    let mut failures = Vec::new();
    let mut unrecoverable = Vec::new();
    let mut notices = Vec::new();

    for (index, (layer, outcome)) in resolved.into_iter().enumerate() {
        match outcome {
            Outcome::Resolved(Some(notice)) => notices.push(format!("{}: {notice}", layer.name)),
            Outcome::Resolved(None) => {}
            Outcome::Failed(reason) => {
                tracing::warn!(index, name = %layer.name, %reason, "layer replaced by placeholder");
                failures.push(LayerFailure {
                    index,
                    name: layer.name.clone(),
                    reason,
                });
            }
            Outcome::Unrecoverable => unrecoverable.push(index),
        }
        layers.push(layer);
    }

    tracing::info!(
        loaded = layers.len(),
        failed = failures.len(),
        unrecoverable = unrecoverable.len(),
        "project loaded"
    );

    Ok(ProjectLoad {
        stack: LayerStack::from_layers(layers),
        export_type: mode,
        content_version: document.content_version,
        failures,
        unrecoverable,
        notices,
    })
}

async fn resolve_layer<L>(entry: &SerializedLayer, mode: ExportMode, loader: &L) -> (Layer, Outcome)
where
    L: SourceLoader + ?Sized,
{
    let (layer, outcome) = match mode {
        ExportMode::Embedded => resolve_embedded(entry),
        ExportMode::Reference => resolve_reference(entry, loader).await,
    };

    let layer = layer
        .with_opacity(entry.opacity)
        .with_visible(entry.visible)
        .with_credits(entry.credits.clone());
    (layer, outcome)
}

fn resolve_embedded(entry: &SerializedLayer) -> (Layer, Outcome) {
    let Some(uri) = entry.img_data.as_deref() else {
        return failed(entry, "no embedded image data".into());
    };

    let normalized = data_uri::decode_image(uri)
        .map_err(|e| e.to_string())
        .and_then(|img| normalize(&img).map_err(|e| e.to_string()));

    match normalized {
        Ok(normalized) => resolved(entry, embedded_origin(entry), normalized),
        Err(reason) => failed(entry, reason),
    }
}

fn embedded_origin(entry: &SerializedLayer) -> LayerOrigin {
    match (entry.kind, entry.src.clone()) {
        (LayerKind::Library, Some(source)) => LayerOrigin::Library { source },
        (LayerKind::Library | LayerKind::Custom, source) => LayerOrigin::Custom { source },
        (LayerKind::Error, attempted) => LayerOrigin::MissingAsset { attempted },
    }
}

async fn resolve_reference<L>(entry: &SerializedLayer, loader: &L) -> (Layer, Outcome)
where
    L: SourceLoader + ?Sized,
{
    let source = match (entry.kind, entry.src.as_deref()) {
        (LayerKind::Library | LayerKind::Error, Some(source)) => source,
        _ => {
            return (
                Layer::missing(entry.name.clone(), entry.src.clone()),
                Outcome::Unrecoverable,
            );
        }
    };

    let normalized = match loader.load(source).await {
        Ok(bytes) => normalize_bytes(&bytes).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match normalized {
        Ok(normalized) => resolved(
            entry,
            LayerOrigin::Library {
                source: source.to_string(),
            },
            normalized,
        ),
        Err(reason) => failed(entry, reason),
    }
}

fn resolved(entry: &SerializedLayer, origin: LayerOrigin, normalized: Normalized) -> (Layer, Outcome) {
    let notice = normalized.fit_notice();
    (Layer::new(entry.name.clone(), origin, normalized), Outcome::Resolved(notice))
}

fn failed(entry: &SerializedLayer, reason: String) -> (Layer, Outcome) {
    (
        Layer::missing(entry.name.clone(), entry.src.clone()),
        Outcome::Failed(reason),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::missing_layer_texture;
    use crate::layer::tests::solid_layer;
    use crate::project::data_uri::encode_png_bytes;
    use crate::project::source::MemorySourceLoader;
    use crate::project::serialize;
    use crate::error::SourceError;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use image::{Rgba, RgbaImage};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll};

    fn png(color: [u8; 4], width: u32, height: u32) -> Vec<u8> {
        encode_png_bytes(&RgbaImage::from_pixel(width, height, Rgba(color))).unwrap()
    }

    fn library_layer(name: &str, src: &str, color: [u8; 4]) -> Layer {
        let normalized = normalize_bytes(&png(color, 64, 64)).unwrap();
        Layer::new(name, LayerOrigin::Library { source: src.into() }, normalized)
    }

    fn doc_json(body: &str) -> String {
        format!("{{{body}}}")
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    #[test]
    fn malformed_json_is_invalid() {
        let err = validate("{not json").unwrap_err();
        assert!(matches!(err, DocumentError::Invalid(InvalidDocument::Malformed(_))));

        let err = validate("[1, 2]").unwrap_err();
        assert!(matches!(err, DocumentError::Invalid(InvalidDocument::Malformed(_))));
    }

    #[test]
    fn missing_version_is_incompatible_before_shape_checks() {
        let err = validate(r#"{"layers": 3}"#).unwrap_err();
        assert!(matches!(err, DocumentError::Incompatible(Incompatibility::Missing)));

        let err = validate(r#"{"systemCompatibilityVersion": null}"#).unwrap_err();
        assert!(matches!(err, DocumentError::Incompatible(Incompatibility::Missing)));

        let err = validate(r#"{"systemCompatibilityVersion": "1"}"#).unwrap_err();
        assert!(matches!(err, DocumentError::Incompatible(Incompatibility::NotAnInteger)));
    }

    #[test]
    fn version_range_is_enforced() {
        let err = validate(&doc_json(
            r#""systemCompatibilityVersion": 0, "exportType": "embedded", "layers": []"#,
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Incompatible(Incompatibility::TooOld { found: 0, minimum: 1 })
        ));

        let err = validate(&doc_json(
            r#""systemCompatibilityVersion": 2, "exportType": "embedded", "layers": []"#,
        ))
        .unwrap_err();
        assert!(err.is_incompatible());
        assert!(matches!(
            err,
            DocumentError::Incompatible(Incompatibility::FromFuture { found: 2, supported: 1 })
        ));
    }

    #[test]
    fn shape_errors_name_the_field() {
        let err = validate(r#"{"systemCompatibilityVersion": 1, "layers": []}"#).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Invalid(InvalidDocument::MissingField("exportType"))
        ));

        let err = validate(r#"{"systemCompatibilityVersion": 1, "exportType": "embedded"}"#)
            .unwrap_err();
        assert!(matches!(err, DocumentError::Invalid(InvalidDocument::LayersNotSequence)));

        let err = validate(
            r#"{"systemCompatibilityVersion": 1, "exportType": "embedded", "layers": {"0": {}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DocumentError::Invalid(InvalidDocument::LayersNotSequence)));

        let err = validate(r#"{"systemCompatibilityVersion": 1, "exportType": "zip", "layers": []}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Invalid(InvalidDocument::Schema { ref path, .. }) if path == "exportType"
        ));

        let err = validate(
            r#"{"systemCompatibilityVersion": 1, "exportType": "reference",
                "layers": [{"name": "ok", "type": "custom"}, {"name": 5, "type": "custom"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Invalid(InvalidDocument::Schema { ref path, .. }) if path == "layers[1]"
        ));
    }

    #[test]
    fn content_version_never_blocks() {
        let doc = validate(
            r#"{"systemCompatibilityVersion": 1, "contentVersion": 42, "exportType": "reference",
                "layers": [{"name": "a", "type": "custom", "futureField": true}]}"#,
        )
        .unwrap();
        assert_eq!(doc.content_version, 42);
        assert_eq!(doc.layers[0].opacity, 1.0);
        assert!(doc.layers[0].visible);

        let doc = validate(
            r#"{"systemCompatibilityVersion": 1, "contentVersion": "new", "exportType": "reference", "layers": []}"#,
        )
        .unwrap();
        assert_eq!(doc.content_version, 0);
    }

    #[test]
    fn hand_built_document_versions_are_checked() {
        let mut doc = ProjectDocument::new(ExportMode::Embedded);
        doc.system_compatibility_version = SYSTEM_COMPATIBILITY_VERSION + 1;
        let err = block_on(load_document(&doc, &MemorySourceLoader::new())).unwrap_err();
        assert!(err.is_incompatible());
    }

    // ------------------------------------------------------------------
    // Round trips
    // ------------------------------------------------------------------

    #[test]
    fn embedded_round_trip_is_lossless() {
        let stack = LayerStack::from_layers(vec![
            library_layer("base", "skins/base.png", [10, 20, 30, 255])
                .with_credits(Some("by someone".into())),
            solid_layer("shirt", [200, 100, 50, 180]).with_opacity(0.35),
            solid_layer("hat", [1, 2, 3, 255]).with_visible(false),
            solid_layer("hat", [1, 2, 3, 255]),
        ]);

        let json = serialize(&stack, ExportMode::Embedded).unwrap().to_json().unwrap();
        let load = block_on(load_project(&json, &MemorySourceLoader::new())).unwrap();

        assert!(!load.is_partial());
        assert!(load.unrecoverable.is_empty());
        assert_eq!(load.stack.len(), stack.len());
        for (before, after) in stack.iter().zip(load.stack.iter()) {
            assert_eq!(before.name, after.name);
            assert_eq!(before.visible, after.visible);
            assert_eq!(before.opacity(), after.opacity());
            assert_eq!(before.credits, after.credits);
            assert_eq!(before.origin, after.origin);
            assert_eq!(before.image(), after.image());
        }
    }

    #[test]
    fn reference_round_trip_loses_custom_pixels_only() {
        let loader = MemorySourceLoader::new()
            .with_asset("skins/base.png", png([10, 20, 30, 255], 64, 64))
            .with_asset("skins/cape.png", png([90, 0, 90, 255], 64, 32));

        let stack = LayerStack::from_layers(vec![
            library_layer("base", "skins/base.png", [10, 20, 30, 255]),
            solid_layer("drawing", [255, 255, 0, 255]).with_opacity(0.5),
            Layer::new(
                "cape",
                LayerOrigin::Library { source: "skins/cape.png".into() },
                normalize_bytes(&png([90, 0, 90, 255], 64, 32)).unwrap(),
            ),
        ]);

        let json = serialize(&stack, ExportMode::Reference).unwrap().to_json().unwrap();
        let load = block_on(load_project(&json, &loader)).unwrap();

        assert!(!load.is_partial());
        assert_eq!(load.unrecoverable, vec![1]);

        let restored: Vec<&Layer> = load.stack.iter().collect();
        assert_eq!(restored[0].image(), stack.get(0).unwrap().image());
        assert_eq!(restored[2].image(), stack.get(2).unwrap().image());

        assert_eq!(restored[1].name, "drawing");
        assert_eq!(restored[1].opacity(), 0.5);
        assert!(restored[1].origin.is_missing());
        assert_eq!(restored[1].image(), missing_layer_texture());
    }

    #[test]
    fn one_unreachable_source_yields_partial_import() {
        let loader = MemorySourceLoader::new()
            .with_asset("a.png", png([255, 0, 0, 255], 64, 64))
            .with_asset("b.png", png([0, 255, 0, 255], 64, 64))
            .with_asset("d.png", png([0, 0, 255, 255], 64, 64));

        let json = r#"{
            "exportType": "reference",
            "systemCompatibilityVersion": 1,
            "contentVersion": 1,
            "layers": [
                {"name": "a", "type": "library", "opacity": 1, "visible": true, "src": "a.png"},
                {"name": "b", "type": "library", "opacity": 1, "visible": true, "src": "b.png"},
                {"name": "c", "type": "library", "opacity": 0.5, "visible": false, "src": "c.png"},
                {"name": "d", "type": "library", "opacity": 1, "visible": true, "src": "d.png"}
            ]
        }"#;

        let load = block_on(load_project(json, &loader)).unwrap();

        let names: Vec<&str> = load.stack.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c", "d"]);

        let kinds: Vec<LayerKind> = load.stack.iter().map(Layer::kind).collect();
        assert_eq!(
            kinds,
            [LayerKind::Library, LayerKind::Library, LayerKind::Error, LayerKind::Library]
        );

        let sentinel = load.stack.get(2).unwrap();
        assert_eq!(
            sentinel.origin,
            LayerOrigin::MissingAsset { attempted: Some("c.png".into()) }
        );
        assert_eq!(sentinel.opacity(), 0.5);
        assert!(!sentinel.visible);

        assert!(load.is_partial());
        assert_eq!(load.failures.len(), 1);
        assert_eq!(load.failures[0].index, 2);
        assert!(load.partial_warning().unwrap().ends_with(": c"));
    }

    #[test]
    fn embedded_decode_failure_is_recovered() {
        let good = crate::project::data_uri::encode_png(&RgbaImage::new(64, 64)).unwrap();
        let json = format!(
            r#"{{"exportType": "embedded", "systemCompatibilityVersion": 1, "contentVersion": 1,
                "layers": [
                    {{"name": "ok", "type": "custom", "opacity": 1, "visible": true, "src": null, "imgData": "{good}"}},
                    {{"name": "broken", "type": "custom", "opacity": 1, "visible": true, "src": null, "imgData": "data:image/png;base64,AAAA"}},
                    {{"name": "absent", "type": "custom", "opacity": 1, "visible": true, "src": null}}
                ]}}"#
        );

        let load = block_on(load_project(&json, &MemorySourceLoader::new())).unwrap();
        assert_eq!(load.stack.len(), 3);
        assert_eq!(load.stack.get(0).unwrap().kind(), LayerKind::Custom);
        assert_eq!(load.stack.get(1).unwrap().kind(), LayerKind::Error);
        assert_eq!(load.stack.get(2).unwrap().kind(), LayerKind::Error);
        let failed: Vec<usize> = load.failures.iter().map(|f| f.index).collect();
        assert_eq!(failed, [1, 2]);
    }

    #[test]
    fn fitted_layers_produce_notices() {
        let loader = MemorySourceLoader::new().with_asset("odd.png", png([1, 1, 1, 255], 30, 40));
        let json = r#"{"exportType": "reference", "systemCompatibilityVersion": 1,
            "layers": [{"name": "odd", "type": "library", "src": "odd.png"}]}"#;

        let load = block_on(load_project(json, &loader)).unwrap();
        assert!(!load.is_partial());
        assert_eq!(load.notices.len(), 1);
        assert!(load.notices[0].starts_with("odd:"));
        assert_eq!(load.content_version, 0);
    }

    // ------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------

    /// Returns Pending once, waking itself.
    struct YieldNow(bool);

    impl Future for YieldNow {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    /// Serves `n.png` after yielding `10 - n` times, so later layers finish
    /// first.
    struct SlowLoader {
        completed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SourceLoader for SlowLoader {
        async fn load(&self, reference: &str) -> Result<Vec<u8>, SourceError> {
            let n: u8 = reference
                .trim_end_matches(".png")
                .parse()
                .map_err(|_| SourceError::NotFound(reference.to_string()))?;
            for _ in n..10 {
                YieldNow(false).await;
            }
            self.completed.lock().unwrap().push(reference.to_string());
            Ok(png([n * 20, 0, 0, 255], 64, 64))
        }
    }

    #[test]
    fn completion_order_does_not_change_stack_order() {
        let layers: Vec<String> = (1..=5)
            .map(|n| format!(r#"{{"name": "L{n}", "type": "library", "src": "{n}.png"}}"#))
            .collect();
        let json = format!(
            r#"{{"exportType": "reference", "systemCompatibilityVersion": 1, "layers": [{}]}}"#,
            layers.join(",")
        );

        let loader = SlowLoader {
            completed: Mutex::new(Vec::new()),
        };
        let load = block_on(load_project(&json, &loader)).unwrap();

        let completed = loader.completed.lock().unwrap().clone();
        assert_eq!(completed.first().map(String::as_str), Some("5.png"));
        assert_eq!(completed.last().map(String::as_str), Some("1.png"));

        let names: Vec<&str> = load.stack.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["L1", "L2", "L3", "L4", "L5"]);
        for (i, layer) in load.stack.iter().enumerate() {
            assert_eq!(layer.image().pixel(0, 0)[0], (i as u8 + 1) * 20);
        }
    }
}
