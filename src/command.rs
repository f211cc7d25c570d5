use serde::{Deserialize, Serialize};

use crate::control::LayerControl;

/// A user action on the layer panel.
///
/// The panel only produces commands; the app runs them against the control
/// because toggles may have to wait for deferred content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    SetBase(String),
    ToggleOverlay {
        id: String,
        visible: bool,
    },
    SetOverlayOpacity {
        id: String,
        opacity: f32,
    },
    ToggleGroup {
        group_id: String,
        visible: bool,
    },
    SetGroupOpacity {
        group_id: String,
        opacity: f32,
    },
    /// Clear a load failure and show the overlay again
    Retry(String),
    ClearMemory,
}

impl Command {
    /// Short label for logs and the status line
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetBase(_) => "Set Base",
            Command::ToggleOverlay { .. } => "Toggle Overlay",
            Command::SetOverlayOpacity { .. } => "Overlay Opacity",
            Command::ToggleGroup { .. } => "Toggle Group",
            Command::SetGroupOpacity { .. } => "Group Opacity",
            Command::Retry(_) => "Retry",
            Command::ClearMemory => "Clear Memory",
        }
    }

    pub async fn execute(self, control: &LayerControl) {
        log::info!("Executing command: {}", self.name());
        log::debug!("{:?}", self);
        match self {
            Command::SetBase(id) => {
                control.set_base(&id);
            }
            Command::ToggleOverlay { id, visible } => {
                let outcome = control.toggle_overlay(&id, visible).await;
                log::debug!("Toggle '{}' -> {:?}", id, outcome);
            }
            Command::SetOverlayOpacity { id, opacity } => {
                control.set_overlay_opacity(&id, opacity);
            }
            Command::ToggleGroup { group_id, visible } => {
                let outcome = control.toggle_overlay_group(&group_id, visible).await;
                log::debug!("Toggle group '{}' -> {:?}", group_id, outcome.members);
            }
            Command::SetGroupOpacity { group_id, opacity } => {
                control.set_group_opacity(&group_id, opacity);
            }
            Command::Retry(id) => {
                let outcome = control.retry_overlay(&id).await;
                log::debug!("Retry '{}' -> {:?}", id, outcome);
            }
            Command::ClearMemory => control.clear_persisted(),
        }
    }
}
