#![warn(clippy::all, rust_2018_idioms)]

#[cfg(not(target_arch = "wasm32"))]
fn main() -> eframe::Result {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 640.0])
            .with_min_inner_size([480.0, 320.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Map Layer Control",
        native_options,
        Box::new(|cc| Ok(Box::new(map_layer_control::LayerControlApp::new(cc)))),
    )
}

// The web build is embedded by a host page that owns the canvas.
#[cfg(target_arch = "wasm32")]
fn main() {}
