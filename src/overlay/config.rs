use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::content::ContentItem;
use super::loader::DeferredLoader;
use super::zoom::ZoomRange;

/// Where to move the camera when a user turns an overlay on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanTarget {
    /// `[lng, lat]`
    pub center: [f64; 2],
    #[serde(default)]
    pub zoom: Option<f64>,
}

/// Declarative description of an overlay.
///
/// Content is either listed statically in `content` or produced on first
/// activation by a [`DeferredLoader`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverlayConfig {
    pub id: String,
    pub label: String,
    pub group: Option<String>,
    pub default_visible: bool,
    pub default_opacity: f32,
    pub content: Vec<ContentItem>,
    #[serde(skip)]
    pub loader: Option<DeferredLoader>,
    #[serde(alias = "minZoomLevel")]
    pub min_zoom: Option<f64>,
    #[serde(alias = "maxZoomLevel")]
    pub max_zoom: Option<f64>,
    pub pan_to: Option<PanTarget>,
    /// Layer id to insert this overlay's content beneath
    pub anchor: Option<String>,
    pub force_base: Option<String>,
    pub force_bearing: Option<f64>,
    pub force_pitch: Option<f64>,
    /// Apply the forced base/bearing/pitch on every show, not only user toggles
    pub force_always: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            label: String::new(),
            group: None,
            default_visible: false,
            default_opacity: 1.0,
            content: Vec::new(),
            loader: None,
            min_zoom: None,
            max_zoom: None,
            pan_to: None,
            anchor: None,
            force_base: None,
            force_bearing: None,
            force_pitch: None,
            force_always: false,
        }
    }
}

impl std::fmt::Debug for OverlayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayConfig")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("group", &self.group)
            .field("default_visible", &self.default_visible)
            .field("default_opacity", &self.default_opacity)
            .field("content", &self.content.len())
            .field("loader", &self.loader.as_ref().map(|_| "<deferred>"))
            .field("zoom", &self.zoom_range())
            .finish_non_exhaustive()
    }
}

impl OverlayConfig {
    /// Overlay with statically declared content
    pub fn new(id: impl Into<String>, label: impl Into<String>, content: Vec<ContentItem>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            content,
            ..Default::default()
        }
    }

    /// Overlay whose content is produced by `loader` on first show
    pub fn deferred(id: impl Into<String>, label: impl Into<String>, loader: DeferredLoader) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            loader: Some(loader),
            ..Default::default()
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_loader(mut self, loader: DeferredLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.default_visible = visible;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.default_opacity = opacity;
        self
    }

    pub fn with_zoom_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_zoom = min;
        self.max_zoom = max;
        self
    }

    pub fn with_pan_to(mut self, target: PanTarget) -> Self {
        self.pan_to = Some(target);
        self
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    pub fn is_deferred(&self) -> bool {
        self.loader.is_some()
    }

    pub fn zoom_range(&self) -> ZoomRange {
        ZoomRange::new(self.min_zoom, self.max_zoom)
    }

    pub fn has_overrides(&self) -> bool {
        self.force_base.is_some() || self.force_bearing.is_some() || self.force_pitch.is_some()
    }
}

/// The configured overlays, in configuration order.
///
/// Cloning shares the list; the facade owns the mutations.
#[derive(Debug, Clone, Default)]
pub struct OverlayRegistry {
    overlays: Arc<RwLock<Vec<OverlayConfig>>>,
}

impl OverlayRegistry {
    pub fn new(overlays: Vec<OverlayConfig>) -> Self {
        Self {
            overlays: Arc::new(RwLock::new(overlays)),
        }
    }

    pub fn get(&self, id: &str) -> Option<OverlayConfig> {
        self.overlays.read().iter().find(|o| o.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.overlays.read().iter().any(|o| o.id == id)
    }

    pub fn all(&self) -> Vec<OverlayConfig> {
        self.overlays.read().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.overlays.read().iter().map(|o| o.id.clone()).collect()
    }

    /// Members of `group` in configuration order
    pub fn group_members(&self, group: &str) -> Vec<String> {
        self.overlays
            .read()
            .iter()
            .filter(|o| o.group.as_deref() == Some(group))
            .map(|o| o.id.clone())
            .collect()
    }

    /// Returns false if the id is already taken
    pub fn insert(&self, config: OverlayConfig) -> bool {
        let mut overlays = self.overlays.write();
        if overlays.iter().any(|o| o.id == config.id) {
            return false;
        }
        overlays.push(config);
        true
    }

    pub fn remove(&self, id: &str) -> Option<OverlayConfig> {
        let mut overlays = self.overlays.write();
        let index = overlays.iter().position(|o| o.id == id)?;
        Some(overlays.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::ContentKind;

    #[test]
    fn test_deserialize_overlay() {
        let json = r#"{
            "id": "quakes",
            "label": "Earthquakes",
            "group": "hazards",
            "defaultVisible": true,
            "minZoomLevel": 5,
            "maxZoom": 10,
            "content": [{"id": "quakes-circle", "kind": "circle"}]
        }"#;
        let overlay: OverlayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(overlay.group.as_deref(), Some("hazards"));
        assert_eq!(overlay.default_opacity, 1.0);
        assert_eq!(overlay.zoom_range(), ZoomRange::new(Some(5.0), Some(10.0)));
        assert_eq!(overlay.content[0].kind, ContentKind::Circle);
        assert!(!overlay.is_deferred());
    }

    #[test]
    fn test_registry_keeps_configuration_order() {
        let registry = OverlayRegistry::new(vec![
            OverlayConfig::new("b", "B", vec![]).with_group("g"),
            OverlayConfig::new("x", "X", vec![]),
            OverlayConfig::new("a", "A", vec![]).with_group("g"),
        ]);
        assert_eq!(registry.group_members("g"), vec!["b", "a"]);
        assert!(!registry.insert(OverlayConfig::new("x", "again", vec![])));
        assert!(registry.remove("x").is_some());
        assert_eq!(registry.ids(), vec!["b", "a"]);
    }
}
