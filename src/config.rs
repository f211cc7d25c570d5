use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::overlay::OverlayConfig;
use crate::state::Viewport;

/// Quiet period before a settled camera is written to storage
pub const DEFAULT_VIEWPORT_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read options: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse options: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A selectable base map style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseStyle {
    pub id: String,
    pub label: String,
    /// Style URL or inline style name, passed through to the surface
    pub style: String,
}

impl BaseStyle {
    pub fn new(id: impl Into<String>, label: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            style: style.into(),
        }
    }
}

/// Display label for a group. Membership comes from `OverlayConfig::group`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceOptions {
    /// Storage key the state record is written under
    pub key: String,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_VIEWPORT_DEBOUNCE_MS
}

impl PersistenceOptions {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            debounce_ms: DEFAULT_VIEWPORT_DEBOUNCE_MS,
        }
    }
}

/// Everything the layer control is configured with
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlOptions {
    pub bases: Vec<BaseStyle>,
    pub default_base: Option<String>,
    pub overlays: Vec<OverlayConfig>,
    pub groups: Vec<GroupConfig>,
    /// `None` disables persistence
    pub persistence: Option<PersistenceOptions>,
    pub default_viewport: Viewport,
    /// Layer id overlays are inserted beneath when they name no anchor.
    /// Falls back to the first label layer of the current style.
    pub label_anchor: Option<String>,
}

impl ControlOptions {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_persistence(mut self, key: impl Into<String>) -> Self {
        self.persistence = Some(PersistenceOptions::new(key));
        self
    }

    pub fn persistence_key(&self) -> Option<&str> {
        self.persistence.as_ref().map(|p| p.key.as_str())
    }

    pub fn base(&self, id: &str) -> Option<&BaseStyle> {
        self.bases.iter().find(|base| base.id == id)
    }

    /// The configured default base if it exists, else the first base
    pub fn default_base_id(&self) -> Option<String> {
        self.default_base
            .as_deref()
            .and_then(|id| self.base(id))
            .or_else(|| self.bases.first())
            .map(|base| base.id.clone())
    }

    /// Group ids in order of first appearance among the overlays
    pub fn group_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.overlays
            .iter()
            .filter_map(|overlay| overlay.group.clone())
            .filter(|group| seen.insert(group.clone()))
            .collect()
    }

    pub fn group_label(&self, id: &str) -> String {
        self.groups
            .iter()
            .find(|group| group.id == id)
            .map(|group| group.label.clone())
            .unwrap_or_else(|| id.to_owned())
    }

    /// Drops overlays and bases whose id is empty or already taken
    pub fn normalized(mut self) -> Self {
        let mut seen = HashSet::new();
        self.bases.retain(|base| {
            let keep = !base.id.is_empty() && seen.insert(base.id.clone());
            if !keep {
                log::warn!("Ignoring base style with duplicate or empty id '{}'", base.id);
            }
            keep
        });

        let mut seen = HashSet::new();
        self.overlays.retain(|overlay| {
            let keep = !overlay.id.is_empty() && seen.insert(overlay.id.clone());
            if !keep {
                log::warn!("Ignoring overlay with duplicate or empty id '{}'", overlay.id);
            }
            keep
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPTIONS: &str = r#"{
        "bases": [
            {"id": "streets", "label": "Streets", "style": "streets.json"},
            {"id": "satellite", "label": "Satellite", "style": "satellite.json"}
        ],
        "defaultBase": "satellite",
        "overlays": [
            {"id": "rivers", "label": "Rivers", "group": "water"},
            {"id": "lakes", "label": "Lakes", "group": "water"},
            {"id": "roads", "label": "Roads"},
            {"id": "rivers", "label": "Duplicate"}
        ],
        "groups": [{"id": "water", "label": "Hydrography"}],
        "persistence": {"key": "layers"}
    }"#;

    #[test]
    fn test_parse_options() {
        let options = ControlOptions::from_json_str(OPTIONS).unwrap().normalized();
        assert_eq!(options.default_base_id().as_deref(), Some("satellite"));
        assert_eq!(options.overlays.len(), 3);
        assert_eq!(options.group_ids(), vec!["water"]);
        assert_eq!(options.group_label("water"), "Hydrography");
        assert_eq!(options.group_label("other"), "other");
        let persistence = options.persistence.unwrap();
        assert_eq!(persistence.key, "layers");
        assert_eq!(persistence.debounce_ms, DEFAULT_VIEWPORT_DEBOUNCE_MS);
    }

    #[test]
    fn test_unknown_default_base_falls_back() {
        let options = ControlOptions {
            bases: vec![BaseStyle::new("a", "A", "a.json")],
            default_base: Some("gone".into()),
            ..Default::default()
        };
        assert_eq!(options.default_base_id().as_deref(), Some("a"));
        assert_eq!(ControlOptions::default().default_base_id(), None);
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(ControlOptions::from_json_str("{"), Err(ConfigError::Parse(_))));
    }
}
