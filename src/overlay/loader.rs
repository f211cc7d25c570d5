use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use thiserror::Error;

use super::config::OverlayConfig;
use super::content::ContentItem;
use crate::state::{OverlayState, StateStore, Viewport};
use crate::surface::SurfaceHandle;

/// Failure reported by a deferred loader
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct LoadError(pub String);

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<&str> for LoadError {
    fn from(message: &str) -> Self {
        Self(message.to_owned())
    }
}

impl From<String> for LoadError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

/// What a deferred loader resolves to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadResult {
    pub content: Vec<ContentItem>,
}

impl LoadResult {
    pub fn new(content: Vec<ContentItem>) -> Self {
        Self { content }
    }

    /// Rejects results that cannot be attached: no content, blank ids or
    /// ids used twice.
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.content.is_empty() {
            return Err(LoadError::new("loader returned no content"));
        }
        let mut seen = HashSet::new();
        for item in &self.content {
            if item.id.trim().is_empty() {
                return Err(LoadError::new("loader returned content without an id"));
            }
            if !seen.insert(item.id.as_str()) {
                return Err(LoadError(format!("loader returned duplicate content id '{}'", item.id)));
            }
        }
        Ok(())
    }
}

/// Read-only view handed to a deferred loader
#[derive(Clone)]
pub struct LoadContext {
    pub overlay_id: String,
    pub config: OverlayConfig,
    pub is_user_interaction: bool,
    store: StateStore,
    surface: SurfaceHandle,
}

impl LoadContext {
    pub(crate) fn new(config: OverlayConfig, is_user_interaction: bool, store: StateStore, surface: SurfaceHandle) -> Self {
        Self {
            overlay_id: config.id.clone(),
            config,
            is_user_interaction,
            store,
            surface,
        }
    }

    /// The live camera if a surface is attached, the recorded one otherwise
    pub fn viewport(&self) -> Viewport {
        self.surface.viewport().unwrap_or_else(|| self.store.viewport())
    }

    pub fn overlay_state(&self, id: &str) -> Option<OverlayState> {
        self.store.overlay_state(id)
    }

    pub fn overlay_states(&self) -> BTreeMap<String, OverlayState> {
        self.store.get_state().overlays
    }

    pub fn surface(&self) -> &SurfaceHandle {
        &self.surface
    }
}

impl std::fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadContext")
            .field("overlay_id", &self.overlay_id)
            .field("is_user_interaction", &self.is_user_interaction)
            .finish_non_exhaustive()
    }
}

type LoaderFn = dyn Fn(LoadContext) -> BoxFuture<'static, Result<LoadResult, LoadError>> + Send + Sync;

/// Produces an overlay's content on first activation
#[derive(Clone)]
pub struct DeferredLoader(Arc<LoaderFn>);

impl DeferredLoader {
    pub fn new<F, Fut>(load: F) -> Self
    where
        F: Fn(LoadContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<LoadResult, LoadError>> + Send + 'static,
    {
        Self(Arc::new(move |ctx| load(ctx).boxed()))
    }

    /// Loader that resolves immediately with `content`
    pub fn ready(content: Vec<ContentItem>) -> Self {
        Self::new(move |_ctx| futures::future::ready(Ok(LoadResult::new(content.clone()))))
    }

    pub fn load(&self, ctx: LoadContext) -> BoxFuture<'static, Result<LoadResult, LoadError>> {
        (self.0)(ctx)
    }
}

impl std::fmt::Debug for DeferredLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DeferredLoader(<fn>)")
    }
}
