use std::collections::HashSet;

use super::{ControlState, GroupState, OverlayState, Viewport};
use crate::config::ControlOptions;
use crate::error::validate_opacity;

/// What restoring a persisted record had to drop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreReport {
    /// Persisted base that is no longer configured
    pub unknown_base: Option<String>,
    pub dropped_overlays: Vec<String>,
    pub dropped_groups: Vec<String>,
    pub dropped_from_order: Vec<String>,
    /// Set when the record could not be read at all
    pub read_error: Option<String>,
}

impl RestoreReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// State of a fresh control built from its configuration alone
pub fn default_state(options: &ControlOptions) -> ControlState {
    let mut state = ControlState {
        base_id: options.default_base_id(),
        viewport: options.default_viewport,
        ..Default::default()
    };
    for overlay in &options.overlays {
        let opacity = validate_opacity(&overlay.id, overlay.default_opacity).unwrap_or(1.0);
        state
            .overlays
            .insert(overlay.id.clone(), OverlayState::new(overlay.default_visible, opacity));
        if overlay.default_visible {
            state.layer_order.push(overlay.id.clone());
        }
    }
    for group in options.group_ids() {
        state.groups.insert(group, GroupState::default());
    }
    state
}

/// Applies a persisted record on top of `defaults`.
///
/// Anything the record names that is no longer configured is dropped and
/// reported, never treated as an error.
pub fn restore(defaults: ControlState, record: ControlState, options: &ControlOptions) -> (ControlState, RestoreReport) {
    let mut state = defaults;
    let mut report = RestoreReport::default();

    if let Some(base_id) = record.base_id {
        if options.base(&base_id).is_some() {
            state.base_id = Some(base_id);
        } else {
            log::warn!("Persisted base style '{}' is no longer configured, keeping default", base_id);
            report.unknown_base = Some(base_id);
        }
    }

    for (id, persisted) in record.overlays {
        match state.overlays.get_mut(&id) {
            Some(current) => {
                current.visible = persisted.visible;
                current.opacity = validate_opacity(&id, persisted.opacity).unwrap_or(current.opacity);
            }
            None => {
                log::warn!("Dropping persisted state for unknown overlay '{}'", id);
                report.dropped_overlays.push(id);
            }
        }
    }

    // Groups still referenced by overlays start hidden unless the record says otherwise.
    for group in options.group_ids() {
        state.groups.entry(group).or_insert_with(GroupState::default);
    }
    for (id, persisted) in record.groups {
        match state.groups.get_mut(&id) {
            Some(current) => {
                current.visible = persisted.visible;
                current.opacity = validate_opacity(&id, persisted.opacity).unwrap_or(current.opacity);
            }
            None => {
                log::warn!("Dropping persisted state for unknown overlay group '{}'", id);
                report.dropped_groups.push(id);
            }
        }
    }

    let mut seen = HashSet::new();
    let mut order = Vec::new();
    for id in record.layer_order {
        match state.overlays.get(&id) {
            Some(overlay) if overlay.visible => {
                if seen.insert(id.clone()) {
                    order.push(id);
                }
            }
            Some(_) => {}
            None => report.dropped_from_order.push(id),
        }
    }
    // Visible overlays the record does not order go on top, in configuration order.
    for overlay in &options.overlays {
        let visible = state.overlays.get(&overlay.id).is_some_and(|s| s.visible);
        if visible && seen.insert(overlay.id.clone()) {
            order.push(overlay.id.clone());
        }
    }
    state.layer_order = order;

    // A missing center or zoom means "not forced"; the configured default stands.
    state.viewport = Viewport {
        center: record.viewport.center.or(state.viewport.center),
        zoom: record.viewport.zoom.or(state.viewport.zoom),
        bearing: record.viewport.bearing,
        pitch: record.viewport.pitch,
    };

    (state, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BaseStyle;
    use crate::overlay::OverlayConfig;

    fn options() -> ControlOptions {
        ControlOptions {
            bases: vec![
                BaseStyle::new("streets", "Streets", "streets.json"),
                BaseStyle::new("dark", "Dark", "dark.json"),
            ],
            overlays: vec![
                OverlayConfig::new("a", "A", vec![]).with_group("g"),
                OverlayConfig::new("b", "B", vec![]).with_group("g").visible(true),
                OverlayConfig::new("c", "C", vec![]).with_opacity(0.4),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_state() {
        let state = default_state(&options());
        assert_eq!(state.base_id.as_deref(), Some("streets"));
        assert_eq!(state.layer_order, vec!["b"]);
        assert_eq!(state.overlays["c"], OverlayState::new(false, 0.4));
        assert_eq!(state.groups["g"], GroupState::default());
        assert_eq!(state.viewport, Viewport::default());
    }

    #[test]
    fn test_restore_drops_unknown_ids() {
        let options = options();
        let record: ControlState = serde_json::from_str(
            r#"{
                "baseId": "terrain",
                "overlays": {"a": {"visible": true, "opacity": 0.5}, "ghost": {"visible": true, "opacity": 1}},
                "groups": {"g": {"visible": true, "opacity": 0.7}, "old": {"visible": true, "opacity": 1}},
                "layerOrder": ["ghost", "a", "a"],
                "viewport": {"center": [2.35, 48.85], "zoom": 9}
            }"#,
        )
        .unwrap();

        let (state, report) = restore(default_state(&options), record, &options);
        assert_eq!(state.base_id.as_deref(), Some("streets"));
        assert_eq!(report.unknown_base.as_deref(), Some("terrain"));
        assert_eq!(report.dropped_overlays, vec!["ghost"]);
        assert_eq!(report.dropped_groups, vec!["old"]);
        assert_eq!(report.dropped_from_order, vec!["ghost"]);
        assert!(!state.overlays.contains_key("ghost"));
        assert_eq!(state.overlays["a"], OverlayState::new(true, 0.5));
        assert_eq!(state.groups["g"], GroupState::new(true, 0.7));
        // "b" is default-visible and not mentioned by the record
        assert_eq!(state.layer_order, vec!["a", "b"]);
        assert_eq!(state.viewport.center, Some([2.35, 48.85]));
        assert_eq!(state.viewport.bearing, 0.0);
    }

    #[test]
    fn test_restore_hidden_overlay_leaves_order() {
        let options = options();
        let record: ControlState =
            serde_json::from_str(r#"{"overlays": {"b": {"visible": false, "opacity": 1}}, "layerOrder": ["b"]}"#)
                .unwrap();
        let (state, report) = restore(default_state(&options), record, &options);
        assert!(state.layer_order.is_empty());
        assert!(report.is_clean());
    }
}
