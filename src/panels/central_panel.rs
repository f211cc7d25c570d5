use crate::control::LayerControl;
use crate::renderer::MapPreview;

/// Draws the map preview and forwards settled camera changes to the control
pub fn central_panel(ctx: &egui::Context, preview: &MapPreview, control: &LayerControl) {
    egui::CentralPanel::default().show(ctx, |ui| {
        let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::drag());

        let change = preview.handle_input(ui, &response);
        if change.zoom_changed {
            control.handle_zoom_end();
        }
        if change.move_ended {
            control.handle_move_end();
        }

        preview.render(&painter, response.rect);
    });
}
