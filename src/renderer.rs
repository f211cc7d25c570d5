use eframe::egui::{self, Align2, Color32, FontId, Rect};

use crate::overlay::ContentKind;
use crate::state::Viewport;
use crate::surface::{MemorySurface, RenderSurface};

const BAND_HEIGHT: f32 = 22.0;
/// Degrees of longitude the preview spans at zoom 0
const WORLD_SPAN: f64 = 360.0;

/// What the camera did during a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraChange {
    /// A drag or scroll ended; the viewport settled
    pub move_ended: bool,
    pub zoom_changed: bool,
}

pub fn kind_color(kind: ContentKind) -> Color32 {
    match kind {
        ContentKind::Background => Color32::from_rgb(235, 230, 220),
        ContentKind::Fill => Color32::from_rgb(120, 170, 220),
        ContentKind::FillExtrusion => Color32::from_rgb(170, 140, 200),
        ContentKind::Line => Color32::from_rgb(220, 120, 60),
        ContentKind::Circle => Color32::from_rgb(230, 80, 110),
        ContentKind::Heatmap => Color32::from_rgb(240, 170, 40),
        ContentKind::Raster => Color32::from_rgb(110, 160, 100),
        ContentKind::Hillshade => Color32::from_rgb(140, 130, 120),
        ContentKind::Symbol => Color32::from_rgb(40, 40, 40),
    }
}

/// Draws a [`MemorySurface`] as a stack of bands, bottom layer at the bottom.
#[derive(Debug, Clone)]
pub struct MapPreview {
    surface: MemorySurface,
}

impl MapPreview {
    pub fn new(surface: MemorySurface) -> Self {
        Self { surface }
    }

    pub fn surface(&self) -> &MemorySurface {
        &self.surface
    }

    /// Drag pans, scroll zooms. The caller forwards settled changes to the control.
    pub fn handle_input(&self, ui: &egui::Ui, response: &egui::Response) -> CameraChange {
        let mut change = CameraChange::default();
        let mut viewport = self.surface.viewport();

        if response.dragged() {
            let delta = response.drag_delta();
            let zoom = viewport.zoom.unwrap_or(0.0);
            let degrees_per_point = WORLD_SPAN / 2f64.powf(zoom) / f64::from(response.rect.width().max(1.0));
            let [lng, lat] = viewport.center.unwrap_or([0.0, 0.0]);
            viewport.center = Some([
                lng - f64::from(delta.x) * degrees_per_point,
                (lat + f64::from(delta.y) * degrees_per_point).clamp(-85.0, 85.0),
            ]);
            self.surface.set_viewport(viewport);
        }
        if response.drag_stopped() {
            change.move_ended = true;
        }

        if response.hovered() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                let zoom = viewport.zoom.unwrap_or(0.0) + f64::from(scroll) / 120.0;
                self.surface.set_zoom(zoom.clamp(0.0, 22.0));
                change.move_ended = true;
                change.zoom_changed = true;
            }
        }
        change
    }

    pub fn render(&self, painter: &egui::Painter, rect: Rect) {
        painter.rect_filled(rect, 0.0, Color32::from_gray(20));

        let stack = self.surface.stack();
        let mut bottom = rect.bottom();
        for (item, from_style) in &stack {
            let band = Rect::from_min_max(egui::pos2(rect.left(), bottom - BAND_HEIGHT), egui::pos2(rect.right(), bottom));
            let alpha = (item.opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
            let [r, g, b, _] = kind_color(item.kind).to_array();
            painter.rect_filled(band, 2.0, Color32::from_rgba_unmultiplied(r, g, b, alpha));

            let text = if *from_style {
                format!("{} (style)", item.id)
            } else {
                item.id.clone()
            };
            painter.text(
                band.left_center() + egui::vec2(8.0, 0.0),
                Align2::LEFT_CENTER,
                text,
                FontId::proportional(12.0),
                Color32::WHITE,
            );
            bottom -= BAND_HEIGHT + 2.0;
        }

        painter.text(
            rect.left_top() + egui::vec2(8.0, 8.0),
            Align2::LEFT_TOP,
            describe_viewport(&self.surface.viewport()),
            FontId::monospace(12.0),
            Color32::LIGHT_GRAY,
        );
    }
}

fn describe_viewport(viewport: &Viewport) -> String {
    let center = viewport
        .center
        .map_or_else(|| "-".to_owned(), |[lng, lat]| format!("{:.3}, {:.3}", lng, lat));
    let zoom = viewport.zoom.map_or_else(|| "-".to_owned(), |zoom| format!("{:.2}", zoom));
    format!(
        "center {}  zoom {}  bearing {:.0}  pitch {:.0}",
        center, zoom, viewport.bearing, viewport.pitch
    )
}
