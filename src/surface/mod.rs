//! The rendering side of the map: an external collaborator the overlay
//! manager attaches content to.

mod memory;

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::config::BaseStyle;
use crate::overlay::{ContentItem, PanTarget};
use crate::state::{Viewport, ViewportPatch};

pub use memory::MemorySurface;

/// Failures reported by a render surface
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("content '{0}' is already on the map")]
    DuplicateContent(String),
    #[error("content '{0}' is not on the map")]
    MissingContent(String),
    #[error("style '{0}' could not be loaded")]
    StyleUnavailable(String),
    #[error("{0}")]
    Rejected(String),
}

/// What the control needs from a map library.
///
/// Content stacks back-to-front. Switching the style drops every attached
/// content item; the control re-adds them afterwards.
pub trait RenderSurface: Send {
    fn set_style(&mut self, base: &BaseStyle) -> Result<(), SurfaceError>;

    /// Adds `item` beneath `before`, or on top when `before` is `None`
    fn add_content(&mut self, item: ContentItem, before: Option<&str>) -> Result<(), SurfaceError>;

    fn remove_content(&mut self, item_id: &str) -> bool;

    fn has_content(&self, item_id: &str) -> bool;

    /// Swaps an attached item for `item` (same id) in place
    fn replace_content(&mut self, item: ContentItem) -> Result<(), SurfaceError>;

    fn move_content(&mut self, item_id: &str, before: Option<&str>) -> Result<(), SurfaceError>;

    /// First label-bearing layer of the current base style
    fn first_label_layer(&self) -> Option<String>;

    fn viewport(&self) -> Viewport;

    fn jump_to(&mut self, patch: &ViewportPatch);

    fn ease_to(&mut self, target: &PanTarget) {
        self.jump_to(&ViewportPatch {
            center: Some(target.center),
            zoom: target.zoom,
            ..Default::default()
        });
    }
}

/// Shared slot holding the attached surface, if any
#[derive(Clone, Default)]
pub struct SurfaceHandle {
    slot: Arc<Mutex<Option<Box<dyn RenderSurface>>>>,
}

impl std::fmt::Debug for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceHandle")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl SurfaceHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, surface: Box<dyn RenderSurface>) -> Option<Box<dyn RenderSurface>> {
        self.slot.lock().replace(surface)
    }

    pub fn take(&self) -> Option<Box<dyn RenderSurface>> {
        self.slot.lock().take()
    }

    pub fn is_attached(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Runs `f` against the surface. `None` when nothing is attached.
    ///
    /// The slot stays locked while `f` runs; `f` must not call back into the
    /// control.
    pub fn with<R>(&self, f: impl FnOnce(&mut (dyn RenderSurface + 'static)) -> R) -> Option<R> {
        let mut slot = self.slot.lock();
        slot.as_mut().map(|surface| f(&mut **surface))
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.with(|surface| surface.viewport())
    }

    pub fn zoom(&self) -> Option<f64> {
        self.viewport().and_then(|viewport| viewport.zoom)
    }
}
