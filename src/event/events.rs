use crate::state::{ControlState, Viewport};

/// Names under which handlers subscribe to the event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BaseChange,
    OverlayChange,
    OverlayGroupChange,
    Change,
    Loading,
    Success,
    Error,
    ViewportChange,
    ZoomFilter,
    MemoryCleared,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BaseChange => "basechange",
            Self::OverlayChange => "overlaychange",
            Self::OverlayGroupChange => "overlaygroupchange",
            Self::Change => "change",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
            Self::ViewportChange => "viewportchange",
            Self::ZoomFilter => "zoomfilter",
            Self::MemoryCleared => "memorycleared",
        }
    }

    /// Looks an event kind up by its wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "basechange" => Self::BaseChange,
            "overlaychange" => Self::OverlayChange,
            "overlaygroupchange" => Self::OverlayGroupChange,
            "change" => Self::Change,
            "loading" => Self::Loading,
            "success" => Self::Success,
            "error" => Self::Error,
            "viewportchange" => Self::ViewportChange,
            "zoomfilter" => Self::ZoomFilter,
            "memorycleared" => Self::MemoryCleared,
            _ => return None,
        })
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    BaseChange {
        base_id: String,
        previous_base_id: Option<String>,
    },
    OverlayChange {
        id: String,
        visible: bool,
        opacity: f32,
        previous_visible: bool,
        previous_opacity: f32,
    },
    OverlayGroupChange {
        group_id: String,
        visible: bool,
        opacity: f32,
        overlays: Vec<String>,
    },
    Change(ControlState),
    Loading {
        id: String,
    },
    Success {
        id: String,
    },
    Error {
        id: String,
        error: String,
    },
    ViewportChange {
        viewport: Viewport,
        previous_viewport: Viewport,
    },
    ZoomFilter {
        id: String,
        filtered: bool,
    },
    MemoryCleared {
        key: String,
    },
}

impl ControlEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::BaseChange { .. } => EventKind::BaseChange,
            Self::OverlayChange { .. } => EventKind::OverlayChange,
            Self::OverlayGroupChange { .. } => EventKind::OverlayGroupChange,
            Self::Change(_) => EventKind::Change,
            Self::Loading { .. } => EventKind::Loading,
            Self::Success { .. } => EventKind::Success,
            Self::Error { .. } => EventKind::Error,
            Self::ViewportChange { .. } => EventKind::ViewportChange,
            Self::ZoomFilter { .. } => EventKind::ZoomFilter,
            Self::MemoryCleared { .. } => EventKind::MemoryCleared,
        }
    }

    /// The overlay this event is about, if any
    pub fn overlay_id(&self) -> Option<&str> {
        match self {
            Self::OverlayChange { id, .. }
            | Self::Loading { id }
            | Self::Success { id }
            | Self::Error { id, .. }
            | Self::ZoomFilter { id, .. } => Some(id),
            _ => None,
        }
    }
}
