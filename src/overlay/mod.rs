mod config;
mod content;
mod loader;
mod manager;
mod zoom;

pub use config::{OverlayConfig, OverlayRegistry, PanTarget};
pub use content::{ContentItem, ContentKind};
pub use loader::{DeferredLoader, LoadContext, LoadError, LoadResult};
pub use manager::{OverlayManager, ShowOutcome};
pub use zoom::ZoomRange;
