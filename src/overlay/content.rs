use serde::{Deserialize, Serialize};

/// What kind of map layer a content item renders as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    Background,
    Fill,
    FillExtrusion,
    Line,
    Circle,
    Heatmap,
    Raster,
    Hillshade,
    Symbol,
}

impl ContentKind {
    /// Symbol layers carry the labels other content is inserted beneath
    pub fn is_label_bearing(&self) -> bool {
        matches!(self, Self::Symbol)
    }
}

fn full_opacity() -> f32 {
    1.0
}

/// One renderable piece of an overlay.
///
/// Items are values: changing the opacity produces a new item via
/// [`ContentItem::with_opacity`] instead of mutating the one on the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Stable id, unique across everything attached to the surface
    pub id: String,
    pub kind: ContentKind,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "full_opacity")]
    pub opacity: f32,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            source: None,
            opacity: 1.0,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Clone of this item drawn at `opacity`
    pub fn with_opacity(&self, opacity: f32) -> Self {
        Self {
            opacity: opacity.clamp(0.0, 1.0),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_opacity_leaves_original() {
        let item = ContentItem::new("rivers-line", ContentKind::Line).with_source("rivers");
        let faded = item.with_opacity(0.25);
        assert_eq!(item.opacity, 1.0);
        assert_eq!(faded.opacity, 0.25);
        assert_eq!(faded.id, item.id);
        assert_eq!(faded.source.as_deref(), Some("rivers"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let item: ContentItem = serde_json::from_str(r#"{"id": "hs", "kind": "hillshade"}"#).unwrap();
        assert_eq!(item.kind, ContentKind::Hillshade);
        assert_eq!(item.opacity, 1.0);
        assert!(item.source.is_none());
    }
}
