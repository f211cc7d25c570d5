use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use parking_lot::Mutex;

use crate::command::Command;
use crate::config::{BaseStyle, ControlOptions, GroupConfig};
use crate::control::LayerControl;
use crate::event::{ControlEvent, EventKind};
use crate::overlay::{ContentItem, ContentKind, DeferredLoader, LoadError, LoadResult, OverlayConfig, PanTarget};
use crate::panels::{PanelModel, central_panel, show_layer_panel};
use crate::renderer::MapPreview;
use crate::state::Storage;
use crate::surface::MemorySurface;

const STORAGE_KEY: &str = "map-layer-control";
const MAX_NOTICES: usize = 5;

/// Demo application: a layer panel next to an in-memory map preview.
pub struct LayerControlApp {
    control: LayerControl,
    preview: MapPreview,
    // Runs toggles that wait on deferred content
    pool: LocalPool,
    notices: Arc<Mutex<Vec<String>>>,
}

impl LayerControlApp {
    /// Called once before the first frame.
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self::with_storage(demo_options(), demo_storage())
    }

    pub fn with_storage(options: ControlOptions, storage: Option<Arc<dyn Storage>>) -> Self {
        let viewport = LayerControl::initial_viewport(&options, storage.as_deref());
        let surface = demo_surface().with_viewport(viewport);
        let control = LayerControl::new(options, storage);

        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = notices.clone();
        control.subscribe(EventKind::Error, move |event: &ControlEvent| {
            if let ControlEvent::Error { id, error } = event {
                let mut notices = sink.lock();
                notices.push(format!("{}: {}", id, error));
                let excess = notices.len().saturating_sub(MAX_NOTICES);
                notices.drain(..excess);
            }
        });

        let mut app = Self {
            control: control.clone(),
            preview: MapPreview::new(surface.clone()),
            pool: LocalPool::new(),
            notices,
        };
        app.spawn(async move { control.attach(Box::new(surface)).await });
        app.run_pending();
        app
    }

    pub fn control(&self) -> &LayerControl {
        &self.control
    }

    pub fn preview(&self) -> &MapPreview {
        &self.preview
    }

    pub fn execute_command(&mut self, command: Command) {
        let control = self.control.clone();
        self.spawn(async move { command.execute(&control).await });
    }

    /// Drives queued commands as far as they can go without blocking
    pub fn run_pending(&mut self) {
        self.pool.run_until_stalled();
    }

    fn spawn(&self, future: impl std::future::Future<Output = ()> + 'static) {
        if let Err(err) = self.pool.spawner().spawn_local(future) {
            log::error!("Failed to queue control task: {}", err);
        }
    }
}

impl eframe::App for LayerControlApp {
    /// Called by the framework to save state before shutdown.
    fn save(&mut self, _storage: &mut dyn eframe::Storage) {
        self.control.flush_viewport();
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let model = PanelModel::from_control(&self.control);
        for command in show_layer_panel(ctx, &model) {
            self.execute_command(command);
        }

        let notices = self.notices.lock().clone();
        if !notices.is_empty() {
            egui::TopBottomPanel::bottom("notices").show(ctx, |ui| {
                for notice in &notices {
                    ui.label(notice);
                }
            });
        }

        central_panel(ctx, &self.preview, &self.control);

        self.run_pending();
        if self.control.poll_persistence() {
            log::debug!("Viewport persisted");
        }
        // Keep polling while a viewport write is pending.
        ctx.request_repaint_after(std::time::Duration::from_millis(250));
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn demo_storage() -> Option<Arc<dyn Storage>> {
    let dir = std::env::temp_dir().join("map_layer_control");
    Some(Arc::new(crate::state::FileStorage::new(dir)))
}

#[cfg(target_arch = "wasm32")]
fn demo_storage() -> Option<Arc<dyn Storage>> {
    Some(Arc::new(crate::state::WebStorage))
}

fn style_layers() -> Vec<ContentItem> {
    vec![
        ContentItem::new("land", ContentKind::Background),
        ContentItem::new("water", ContentKind::Fill),
        ContentItem::new("roads", ContentKind::Line),
        ContentItem::new("place-labels", ContentKind::Symbol),
    ]
}

fn demo_surface() -> MemorySurface {
    MemorySurface::new()
        .with_style_layers("streets", style_layers())
        .with_style_layers("dark", style_layers())
        .with_style_layers("satellite", vec![ContentItem::new("imagery", ContentKind::Raster)])
}

pub fn demo_options() -> ControlOptions {
    // Fails on the first load so the retry path can be tried from the panel.
    let attempts = Arc::new(AtomicUsize::new(0));
    let wildfires = DeferredLoader::new(move |_ctx| {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt == 0 {
                Err(LoadError::new("feed unavailable"))
            } else {
                Ok(LoadResult::new(vec![
                    ContentItem::new("wildfires-heat", ContentKind::Heatmap).with_source("wildfires"),
                    ContentItem::new("wildfires-points", ContentKind::Circle).with_source("wildfires"),
                ]))
            }
        }
    });

    let parcels = DeferredLoader::new(|ctx| {
        let zoom = ctx.viewport().zoom;
        async move {
            log::info!("Loading parcels at zoom {:?}", zoom);
            Ok(LoadResult::new(vec![
                ContentItem::new("parcels-fill", ContentKind::Fill).with_source("parcels"),
                ContentItem::new("parcels-outline", ContentKind::Line).with_source("parcels"),
            ]))
        }
    });

    ControlOptions {
        bases: vec![
            BaseStyle::new("streets", "Streets", "streets.json"),
            BaseStyle::new("dark", "Dark", "dark.json"),
            BaseStyle::new("satellite", "Satellite", "satellite.json"),
        ],
        default_base: Some("streets".into()),
        overlays: vec![
            OverlayConfig::new(
                "rivers",
                "Rivers",
                vec![ContentItem::new("rivers-line", ContentKind::Line).with_source("hydro")],
            )
            .with_group("hydro"),
            OverlayConfig::new(
                "lakes",
                "Lakes",
                vec![ContentItem::new("lakes-fill", ContentKind::Fill).with_source("hydro")],
            )
            .with_group("hydro")
            .visible(true),
            OverlayConfig::new(
                "buildings",
                "Buildings",
                vec![ContentItem::new("buildings-3d", ContentKind::FillExtrusion).with_source("osm")],
            )
            .with_zoom_range(Some(14.0), None),
            OverlayConfig::deferred("parcels", "Parcels", parcels).with_zoom_range(Some(10.0), Some(20.0)),
            OverlayConfig::deferred("wildfires", "Wildfires", wildfires)
                .with_opacity(0.8)
                .with_pan_to(PanTarget {
                    center: [-120.5, 38.5],
                    zoom: Some(6.0),
                }),
        ],
        groups: vec![GroupConfig {
            id: "hydro".into(),
            label: "Hydrography".into(),
        }],
        persistence: Some(crate::config::PersistenceOptions::new(STORAGE_KEY)),
        ..Default::default()
    }
}
