mod central_panel;
mod layer_panel;

pub use central_panel::central_panel;
pub use layer_panel::{GroupSection, OverlayRow, PanelModel, layer_panel, show_layer_panel};
