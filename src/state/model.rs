use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Visibility and opacity of a single overlay or group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayState {
    pub visible: bool,
    pub opacity: f32,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self {
            visible: false,
            opacity: 1.0,
        }
    }
}

impl OverlayState {
    pub fn new(visible: bool, opacity: f32) -> Self {
        Self { visible, opacity }
    }

    /// Merges a partial update into a copy of this state
    pub fn merged(&self, patch: &StatePatch) -> Self {
        Self {
            visible: patch.visible.unwrap_or(self.visible),
            opacity: patch.opacity.unwrap_or(self.opacity),
        }
    }
}

/// Groups share the overlay record shape.
pub type GroupState = OverlayState;

/// Partial update for an overlay or group record
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatePatch {
    pub visible: Option<bool>,
    pub opacity: Option<f32>,
}

impl StatePatch {
    pub fn visible(visible: bool) -> Self {
        Self {
            visible: Some(visible),
            opacity: None,
        }
    }

    pub fn opacity(opacity: f32) -> Self {
        Self {
            visible: None,
            opacity: Some(opacity),
        }
    }
}

/// Camera state of the map.
///
/// `center` and `zoom` are `None` when no viewport has been forced or
/// persisted yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    /// `[lng, lat]`
    pub center: Option<[f64; 2]>,
    pub zoom: Option<f64>,
    pub bearing: f64,
    pub pitch: f64,
}

impl Viewport {
    pub fn merged(&self, patch: &ViewportPatch) -> Self {
        Self {
            center: patch.center.or(self.center),
            zoom: patch.zoom.or(self.zoom),
            bearing: patch.bearing.unwrap_or(self.bearing),
            pitch: patch.pitch.unwrap_or(self.pitch),
        }
    }
}

/// Partial viewport update: only the provided fields change
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportPatch {
    pub center: Option<[f64; 2]>,
    pub zoom: Option<f64>,
    pub bearing: Option<f64>,
    pub pitch: Option<f64>,
}

impl From<Viewport> for ViewportPatch {
    fn from(viewport: Viewport) -> Self {
        Self {
            center: viewport.center,
            zoom: viewport.zoom,
            bearing: Some(viewport.bearing),
            pitch: Some(viewport.pitch),
        }
    }
}

impl ViewportPatch {
    pub fn is_empty(&self) -> bool {
        self.center.is_none() && self.zoom.is_none() && self.bearing.is_none() && self.pitch.is_none()
    }
}

/// Full state of the control.
///
/// This is both the value returned by `get_state` and the record written to
/// durable storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlState {
    pub base_id: Option<String>,
    pub overlays: BTreeMap<String, OverlayState>,
    pub groups: BTreeMap<String, GroupState>,
    /// Back-to-front: the last id is drawn on top.
    pub layer_order: Vec<String>,
    pub viewport: Viewport,
}

/// Bulk update accepted by `LayerControl::set_state`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlStatePatch {
    pub base_id: Option<String>,
    pub overlays: BTreeMap<String, StatePatch>,
    pub groups: BTreeMap<String, StatePatch>,
    pub viewport: Option<ViewportPatch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_merge_keeps_missing_fields() {
        let viewport = Viewport {
            center: Some([10.0, 50.0]),
            zoom: Some(6.0),
            bearing: 15.0,
            pitch: 0.0,
        };
        let merged = viewport.merged(&ViewportPatch {
            pitch: Some(40.0),
            ..Default::default()
        });
        assert_eq!(merged.center, Some([10.0, 50.0]));
        assert_eq!(merged.zoom, Some(6.0));
        assert_eq!(merged.bearing, 15.0);
        assert_eq!(merged.pitch, 40.0);
    }

    #[test]
    fn test_record_uses_camel_case_keys() {
        let mut state = ControlState {
            base_id: Some("streets".into()),
            ..Default::default()
        };
        state.layer_order.push("rivers".into());
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["baseId"], "streets");
        assert_eq!(json["layerOrder"][0], "rivers");
        assert!(json["viewport"]["center"].is_null());
        assert_eq!(json["viewport"]["bearing"], 0.0);
    }

    #[test]
    fn test_partial_record_defaults() {
        let state: ControlState =
            serde_json::from_str(r#"{"overlays": {"a": {"visible": true}}, "viewport": {"zoom": 4}}"#).unwrap();
        assert_eq!(state.overlays["a"], OverlayState::new(true, 1.0));
        assert_eq!(state.viewport.zoom, Some(4.0));
        assert_eq!(state.viewport.pitch, 0.0);
        assert!(state.base_id.is_none());
    }
}
