use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use super::config::{OverlayConfig, OverlayRegistry};
use super::content::ContentItem;
use super::loader::{LoadContext, LoadError, LoadResult};
use crate::config::BaseStyle;
use crate::error::{ControlError, ControlResult};
use crate::event::{ControlEvent, EventBus};
use crate::state::{StateStore, ViewportPatch};
use crate::surface::{SurfaceError, SurfaceHandle};

/// Result of asking the manager to show an overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutcome {
    /// Content is on the surface
    Shown,
    /// Logically on, but outside its zoom range
    Filtered,
    /// Nothing was attached
    Failed,
}

/// Per-overlay runtime bookkeeping. Never persisted.
#[derive(Debug, Default)]
struct Runtime {
    /// Resolved deferred content
    cache: HashMap<String, Vec<ContentItem>>,
    in_flight: HashSet<String>,
    /// Loads whose overlay was hidden before they resolved
    superseded: HashSet<String>,
    /// Cached content to load again on the next show
    stale: HashSet<String>,
    errors: HashMap<String, String>,
    filtered: HashSet<String>,
    /// Content item ids currently on the surface, per overlay
    attached: HashMap<String, Vec<String>>,
    reapplying: bool,
}

enum LoadGate {
    Ready,
    Start,
    Busy,
}

/// Realizes overlay state on the render surface.
///
/// Handles deferred loading with at most one load in flight per overlay,
/// zoom filtering, opacity and z-order.
#[derive(Clone)]
pub struct OverlayManager {
    registry: OverlayRegistry,
    store: StateStore,
    surface: SurfaceHandle,
    bus: EventBus,
    bases: Arc<Vec<BaseStyle>>,
    label_anchor: Option<String>,
    runtime: Arc<Mutex<Runtime>>,
}

impl std::fmt::Debug for OverlayManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayManager")
            .field("overlays", &self.registry.ids())
            .field("surface", &self.surface)
            .field("runtime", &*self.runtime.lock())
            .finish()
    }
}

impl OverlayManager {
    pub fn new(
        registry: OverlayRegistry,
        store: StateStore,
        surface: SurfaceHandle,
        bus: EventBus,
        bases: Vec<BaseStyle>,
        label_anchor: Option<String>,
    ) -> Self {
        Self {
            registry,
            store,
            surface,
            bus,
            bases: Arc::new(bases),
            label_anchor,
            runtime: Arc::new(Mutex::new(Runtime::default())),
        }
    }

    pub fn is_loading(&self, id: &str) -> bool {
        self.runtime.lock().in_flight.contains(id)
    }

    pub fn is_filtered(&self, id: &str) -> bool {
        self.runtime.lock().filtered.contains(id)
    }

    pub fn is_attached(&self, id: &str) -> bool {
        self.runtime.lock().attached.contains_key(id)
    }

    pub fn error(&self, id: &str) -> Option<String> {
        self.runtime.lock().errors.get(id).cloned()
    }

    /// Loads (if needed) and attaches an overlay's content.
    pub async fn show(&self, id: &str, is_user_interaction: bool) -> ShowOutcome {
        let Some(config) = self.registry.get(id) else {
            log::warn!("Cannot show unknown overlay '{}'", id);
            return ShowOutcome::Failed;
        };
        if let Some(error) = self.error(id) {
            log::debug!("Overlay '{}' has a recorded error, retry required: {}", id, error);
            return ShowOutcome::Failed;
        }

        let mut announced = false;
        if let Some(loader) = config.loader.clone() {
            match self.gate_load(id) {
                LoadGate::Ready => {}
                LoadGate::Busy => {
                    // The latest intent wins: an earlier hide no longer cancels the load.
                    self.runtime.lock().superseded.remove(id);
                    log::debug!("Overlay '{}' is already loading", id);
                    return ShowOutcome::Failed;
                }
                LoadGate::Start => {
                    self.bus.publish(ControlEvent::Loading { id: id.to_owned() });
                    let ctx = LoadContext::new(config.clone(), is_user_interaction, self.store.clone(), self.surface.clone());
                    let result = loader.load(ctx).await;
                    if !self.registry.contains(id) {
                        self.abandon_load(id);
                        log::debug!("Overlay '{}' was removed while loading, dropping its content", id);
                        return ShowOutcome::Failed;
                    }
                    if let Err(err) = self.finish_load(id, result) {
                        self.detach(id);
                        self.record_failure(
                            id,
                            ControlError::Load {
                                id: id.to_owned(),
                                message: err.to_string(),
                            },
                        );
                        return ShowOutcome::Failed;
                    }
                    self.bus.publish(ControlEvent::Success { id: id.to_owned() });
                    announced = true;
                    if self.runtime.lock().superseded.remove(id) {
                        log::debug!("Overlay '{}' was hidden while loading, not attaching", id);
                        return ShowOutcome::Failed;
                    }
                }
            }
        }

        if (is_user_interaction || config.force_always) && config.has_overrides() {
            self.apply_overrides(&config);
        }

        let zoom = self.current_zoom();
        if !config.zoom_range().admits(zoom) {
            self.detach(id);
            let newly_filtered = self.runtime.lock().filtered.insert(id.to_owned());
            if newly_filtered {
                self.bus.publish(ControlEvent::ZoomFilter {
                    id: id.to_owned(),
                    filtered: true,
                });
            }
            log::debug!("Overlay '{}' filtered at zoom {:?}", id, zoom);
            return ShowOutcome::Filtered;
        }
        if self.runtime.lock().filtered.remove(id) {
            self.bus.publish(ControlEvent::ZoomFilter {
                id: id.to_owned(),
                filtered: false,
            });
        }

        if let Err(err) = self.attach(&config) {
            self.detach(id);
            self.record_failure(id, err);
            return ShowOutcome::Failed;
        }
        if !announced {
            self.bus.publish(ControlEvent::Success { id: id.to_owned() });
        }

        if is_user_interaction {
            if let Some(target) = config.pan_to {
                self.surface.with(|surface| surface.ease_to(&target));
                // The pan can move the camera across zoom bounds.
                self.update_all_zoom_filtering();
            }
        }
        log::debug!("Overlay '{}' shown", id);
        ShowOutcome::Shown
    }

    /// Removes an overlay's content from the surface. Hiding a hidden overlay is a no-op.
    pub fn hide(&self, id: &str) {
        {
            let mut runtime = self.runtime.lock();
            if runtime.in_flight.contains(id) {
                runtime.superseded.insert(id.to_owned());
            }
            runtime.filtered.remove(id);
        }
        if self.detach(id) {
            log::debug!("Overlay '{}' hidden", id);
        }
    }

    /// Swaps the attached content for copies drawn at `opacity`
    pub fn apply_opacity(&self, id: &str, opacity: f32) {
        let Some(attached) = self.runtime.lock().attached.get(id).cloned() else {
            return;
        };
        let Some(content) = self.registry.get(id).and_then(|config| self.content_for(&config)) else {
            return;
        };
        self.surface.with(|surface| {
            for item in content.iter().filter(|item| attached.contains(&item.id)) {
                if let Err(err) = surface.replace_content(item.with_opacity(opacity)) {
                    log::error!("Failed to update opacity of '{}': {}", item.id, err);
                }
            }
        });
    }

    /// Switches the surface style and puts the attached content back.
    pub fn set_base(&self, base_id: &str) -> ControlResult<()> {
        let base = self
            .bases
            .iter()
            .find(|base| base.id == base_id)
            .ok_or_else(|| ControlError::UnknownBase(base_id.to_owned()))?;
        let switched = self.surface.with(|surface| surface.set_style(base));
        match switched {
            None => Ok(()),
            Some(Ok(())) => {
                self.handle_style_reload();
                Ok(())
            }
            Some(Err(err)) => Err(ControlError::Surface {
                id: base_id.to_owned(),
                source: err,
            }),
        }
    }

    /// The surface dropped its content (style reload): attach everything again.
    pub fn handle_style_reload(&self) {
        let attached: Vec<String> = {
            let mut runtime = self.runtime.lock();
            if runtime.reapplying {
                return;
            }
            runtime.reapplying = true;
            runtime.attached.keys().cloned().collect()
        };

        for id in attached {
            let Some(config) = self.registry.get(&id) else {
                continue;
            };
            if let Err(err) = self.attach(&config) {
                self.runtime.lock().attached.remove(&id);
                self.record_failure(&id, err);
            }
        }
        self.reposition();
        self.runtime.lock().reapplying = false;
    }

    /// Re-checks zoom bounds of every visible overlay against the current zoom
    pub fn update_all_zoom_filtering(&self) {
        let zoom = self.current_zoom();
        let mut changed = false;

        for config in self.registry.all() {
            let id = config.id.as_str();
            if config.zoom_range().is_unbounded() {
                continue;
            }
            if !self.store.is_visible(id) || self.content_for(&config).is_none() {
                continue;
            }
            let (filtered, errored) = {
                let runtime = self.runtime.lock();
                (runtime.filtered.contains(id), runtime.errors.contains_key(id))
            };
            if errored {
                continue;
            }
            let in_range = config.zoom_range().admits(zoom);

            if !in_range && !filtered {
                self.detach(id);
                self.runtime.lock().filtered.insert(id.to_owned());
                self.bus.publish(ControlEvent::ZoomFilter {
                    id: id.to_owned(),
                    filtered: true,
                });
                changed = true;
            } else if in_range && filtered {
                self.runtime.lock().filtered.remove(id);
                if let Err(err) = self.attach(&config) {
                    self.record_failure(id, err);
                    continue;
                }
                self.bus.publish(ControlEvent::ZoomFilter {
                    id: id.to_owned(),
                    filtered: false,
                });
                changed = true;
            }
        }

        if changed {
            self.reposition();
        }
    }

    /// Orders attached content to match the store's layer order
    pub fn reposition(&self) {
        let order = self.store.layer_order();
        let attached = self.runtime.lock().attached.clone();
        let anchors: HashMap<String, Option<String>> = order
            .iter()
            .filter(|id| attached.contains_key(*id))
            .map(|id| (id.clone(), self.registry.get(id).and_then(|config| config.anchor)))
            .collect();
        let default_anchor = self.label_anchor.clone();

        self.surface.with(|surface| {
            let fallback = default_anchor
                .filter(|anchor| surface.has_content(anchor))
                .or_else(|| surface.first_label_layer());
            for id in &order {
                let Some(items) = attached.get(id) else {
                    continue;
                };
                let anchor = anchors
                    .get(id)
                    .cloned()
                    .flatten()
                    .filter(|anchor| surface.has_content(anchor))
                    .or_else(|| fallback.clone());
                for item in items {
                    if let Err(err) = surface.move_content(item, anchor.as_deref()) {
                        log::error!("Failed to reorder '{}': {}", item, err);
                    }
                }
            }
        });
    }

    /// Clears a recorded failure so the next show loads again
    pub fn retry(&self, id: &str) {
        let mut runtime = self.runtime.lock();
        runtime.errors.remove(id);
        runtime.cache.remove(id);
        runtime.stale.remove(id);
    }

    /// Marks cached deferred content for reloading on the next show.
    ///
    /// Attached content stays on the surface (and survives style reloads)
    /// until the new content replaces it.
    pub fn invalidate(&self, id: &str) {
        let mut runtime = self.runtime.lock();
        if runtime.cache.contains_key(id) {
            runtime.stale.insert(id.to_owned());
        }
    }

    /// Hides the overlay and drops everything known about it.
    ///
    /// A load still in flight stays superseded and is dropped when it resolves.
    pub fn forget(&self, id: &str) {
        self.hide(id);
        let mut runtime = self.runtime.lock();
        runtime.cache.remove(id);
        runtime.errors.remove(id);
        runtime.stale.remove(id);
    }

    /// Removes all content from the surface, e.g. before detaching it
    pub fn detach_all(&self) {
        let ids: Vec<String> = self.runtime.lock().attached.keys().cloned().collect();
        for id in ids {
            self.detach(&id);
        }
        self.runtime.lock().filtered.clear();
    }

    fn gate_load(&self, id: &str) -> LoadGate {
        let mut runtime = self.runtime.lock();
        if runtime.in_flight.contains(id) {
            LoadGate::Busy
        } else if runtime.cache.contains_key(id) && !runtime.stale.contains(id) {
            LoadGate::Ready
        } else {
            runtime.in_flight.insert(id.to_owned());
            runtime.superseded.remove(id);
            LoadGate::Start
        }
    }

    fn finish_load(&self, id: &str, result: Result<LoadResult, LoadError>) -> Result<(), LoadError> {
        let mut runtime = self.runtime.lock();
        runtime.in_flight.remove(id);
        runtime.stale.remove(id);
        let result = result.and_then(|loaded| loaded.validate().map(|_| loaded));
        match result {
            Ok(loaded) => {
                runtime.cache.insert(id.to_owned(), loaded.content);
                Ok(())
            }
            Err(err) => {
                runtime.cache.remove(id);
                runtime.superseded.remove(id);
                Err(err)
            }
        }
    }

    /// The overlay was removed while its load was in flight
    fn abandon_load(&self, id: &str) {
        let mut runtime = self.runtime.lock();
        runtime.in_flight.remove(id);
        runtime.superseded.remove(id);
    }

    /// Records the failure message and reports it as an `error` event
    fn record_failure(&self, id: &str, err: ControlError) {
        log::error!("{}", err);
        let message = match err {
            ControlError::Load { message, .. } => message,
            ControlError::Surface { source, .. } => source.to_string(),
            other => other.to_string(),
        };
        self.runtime.lock().errors.insert(id.to_owned(), message.clone());
        self.bus.publish(ControlEvent::Error {
            id: id.to_owned(),
            error: message,
        });
    }

    /// Static content, or the cached result of a deferred load
    fn content_for(&self, config: &OverlayConfig) -> Option<Vec<ContentItem>> {
        if config.is_deferred() {
            self.runtime.lock().cache.get(&config.id).cloned()
        } else {
            Some(config.content.clone())
        }
    }

    fn current_zoom(&self) -> Option<f64> {
        self.surface.zoom().or_else(|| self.store.viewport().zoom)
    }

    fn apply_overrides(&self, config: &OverlayConfig) {
        if let Some(base) = &config.force_base {
            if self.store.base_id().as_deref() != Some(base.as_str()) {
                let switched = self.store.set_base(base).and_then(|_| self.set_base(base));
                if let Err(err) = switched {
                    log::warn!("Overlay '{}' could not force base style: {}", config.id, err);
                }
            }
        }
        let patch = ViewportPatch {
            bearing: config.force_bearing,
            pitch: config.force_pitch,
            ..Default::default()
        };
        if !patch.is_empty() {
            self.store.set_viewport(patch);
            self.surface.with(|surface| surface.jump_to(&patch));
        }
    }

    /// Puts the overlay's content on the surface at its recorded opacity.
    ///
    /// Partially added content is rolled back when an item is rejected, and
    /// items of earlier content that the new content dropped are removed.
    fn attach(&self, config: &OverlayConfig) -> ControlResult<()> {
        let Some(content) = self.content_for(config) else {
            return Err(ControlError::Load {
                id: config.id.clone(),
                message: "content is not loaded".to_owned(),
            });
        };
        let previous = self.runtime.lock().attached.get(&config.id).cloned().unwrap_or_default();
        let opacity = self.store.overlay_state(&config.id).map(|state| state.opacity).unwrap_or(1.0);
        let explicit_anchor = config.anchor.clone().or_else(|| self.label_anchor.clone());

        let added = self.surface.with(|surface| {
            let anchor = explicit_anchor
                .filter(|anchor| surface.has_content(anchor))
                .or_else(|| surface.first_label_layer());
            let mut added: Vec<String> = Vec::with_capacity(content.len());
            for item in &content {
                let item = item.with_opacity(opacity);
                let result = if surface.has_content(&item.id) {
                    surface.replace_content(item.clone())
                } else {
                    surface.add_content(item.clone(), anchor.as_deref())
                };
                if let Err(err) = result {
                    for id in &added {
                        surface.remove_content(id);
                    }
                    return Err(err);
                }
                added.push(item.id);
            }
            for id in previous.iter().filter(|id| !added.contains(*id)) {
                surface.remove_content(id);
            }
            Ok::<_, SurfaceError>(added)
        });

        match added {
            None => Ok(()),
            Some(Ok(ids)) => {
                self.runtime.lock().attached.insert(config.id.clone(), ids);
                if !self.runtime.lock().reapplying {
                    self.reposition();
                }
                Ok(())
            }
            Some(Err(source)) => Err(ControlError::Surface {
                id: config.id.clone(),
                source,
            }),
        }
    }

    /// Returns true if anything was removed
    fn detach(&self, id: &str) -> bool {
        let Some(items) = self.runtime.lock().attached.remove(id) else {
            return false;
        };
        self.surface.with(|surface| {
            for item in &items {
                surface.remove_content(item);
            }
        });
        true
    }
}
