#![warn(clippy::all, rust_2018_idioms)]

pub mod app;
pub mod command;
pub mod config;
pub mod control;
pub mod error;
pub mod event;
pub mod overlay;
pub mod panels;
pub mod renderer;
pub mod state;
pub mod surface;
pub mod util;

pub use app::LayerControlApp;
pub use command::Command;
pub use config::{BaseStyle, ConfigError, ControlOptions, GroupConfig, PersistenceOptions};
pub use control::{GroupToggleOutcome, LayerControl, ToggleOutcome};
pub use error::{ControlError, ControlResult};
pub use event::{ControlEvent, EventBus, EventHandler, EventKind, SubscriptionId};
pub use overlay::{ContentItem, ContentKind, DeferredLoader, LoadContext, LoadError, LoadResult, OverlayConfig};
pub use renderer::MapPreview;
pub use state::{ControlState, ControlStatePatch, FileStorage, MemoryStorage, Storage, Viewport, ViewportPatch};
pub use surface::{MemorySurface, RenderSurface, SurfaceError};
