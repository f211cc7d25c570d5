use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{BaseStyle, ControlOptions, DEFAULT_VIEWPORT_DEBOUNCE_MS};
use crate::error::{ControlError, validate_opacity};
use crate::event::{EventBus, EventHandler, EventKind, SubscriptionId};
use crate::overlay::{OverlayConfig, OverlayManager, OverlayRegistry, ShowOutcome};
use crate::state::{
    ControlState, ControlStatePatch, GroupState, OverlayState, RestoreReport, StatePatch, StateStore, Storage,
    Viewport, ViewportPatch,
};
use crate::surface::{RenderSurface, SurfaceHandle};
use crate::util::{Debouncer, time};

/// Result of a visibility change requested through the facade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Shown,
    /// On, but outside the overlay's zoom range
    Filtered,
    Hidden,
    /// The overlay stays off; see the `error` event
    Failed,
    /// No surface attached yet; applied on attach
    Recorded,
    /// Unknown id or invalid request, nothing changed
    Ignored,
}

impl From<ShowOutcome> for ToggleOutcome {
    fn from(outcome: ShowOutcome) -> Self {
        match outcome {
            ShowOutcome::Shown => Self::Shown,
            ShowOutcome::Filtered => Self::Filtered,
            ShowOutcome::Failed => Self::Failed,
        }
    }
}

/// Per-member results of a group toggle, in configuration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupToggleOutcome {
    pub group_id: String,
    pub members: Vec<(String, ToggleOutcome)>,
}

impl GroupToggleOutcome {
    pub fn outcome_of(&self, id: &str) -> Option<ToggleOutcome> {
        self.members
            .iter()
            .find(|(member, _)| member == id)
            .map(|(_, outcome)| *outcome)
    }
}

/// The map layer control.
///
/// Records intent in the [`StateStore`] and realizes it on the attached
/// [`RenderSurface`] through the [`OverlayManager`]. Unknown ids and invalid
/// values are logged and ignored; nothing here panics or returns an error
/// to the caller.
///
/// Clones are handles to the same control.
#[derive(Clone)]
pub struct LayerControl {
    options: Arc<ControlOptions>,
    registry: OverlayRegistry,
    store: StateStore,
    manager: OverlayManager,
    bus: EventBus,
    surface: SurfaceHandle,
    viewport_writes: Arc<Mutex<Debouncer<Viewport>>>,
}

impl std::fmt::Debug for LayerControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerControl")
            .field("store", &self.store)
            .field("manager", &self.manager)
            .field("bus", &self.bus)
            .finish()
    }
}

impl LayerControl {
    /// Builds the control and restores persisted state from `storage`.
    pub fn new(options: ControlOptions, storage: Option<Arc<dyn Storage>>) -> Self {
        let options = options.normalized();
        let bus = EventBus::new();
        let store = StateStore::new(&options, storage, bus.clone());
        let registry = OverlayRegistry::new(options.overlays.clone());
        let surface = SurfaceHandle::new();
        let manager = OverlayManager::new(
            registry.clone(),
            store.clone(),
            surface.clone(),
            bus.clone(),
            options.bases.clone(),
            options.label_anchor.clone(),
        );
        let debounce_ms = options
            .persistence
            .as_ref()
            .map_or(DEFAULT_VIEWPORT_DEBOUNCE_MS, |p| p.debounce_ms);

        Self {
            options: Arc::new(options),
            registry,
            store,
            manager,
            bus,
            surface,
            viewport_writes: Arc::new(Mutex::new(Debouncer::from_millis(debounce_ms))),
        }
    }

    /// Base style a control built from `options` and `storage` would start
    /// with. Lets the host create its map with the right style.
    pub fn initial_base(options: &ControlOptions, storage: Option<&dyn Storage>) -> Option<String> {
        Self::initial_state(options, storage).base_id
    }

    /// Viewport a control built from `options` and `storage` would start with
    pub fn initial_viewport(options: &ControlOptions, storage: Option<&dyn Storage>) -> Viewport {
        Self::initial_state(options, storage).viewport
    }

    fn initial_state(options: &ControlOptions, storage: Option<&dyn Storage>) -> ControlState {
        let options = options.clone().normalized();
        let source = options.persistence_key().zip(storage).map(|(key, storage)| (storage, key));
        StateStore::initial_state(&options, source).0
    }

    // ---------------------------------------------------------------------
    // Surface lifecycle

    /// Hands the control a render surface and replays the current state onto
    /// it: base style, viewport, then visible overlays back to front.
    pub async fn attach(&self, surface: Box<dyn RenderSurface>) {
        if self.surface.is_attached() {
            log::warn!("Replacing the attached render surface");
            self.detach();
        }
        self.surface.install(surface);

        if let Some(base) = self.store.base_id() {
            if let Err(err) = self.manager.set_base(&base) {
                log::error!("Failed to apply base style '{}': {}", base, err);
            }
        }
        let viewport = self.store.viewport();
        if viewport.center.is_some() || viewport.zoom.is_some() {
            let patch = ViewportPatch::from(viewport);
            self.surface.with(|surface| surface.jump_to(&patch));
        }

        for id in self.store.layer_order() {
            let outcome = self.manager.show(&id, false).await;
            self.settle(&id, outcome);
        }
    }

    /// Removes all content and returns the surface
    pub fn detach(&self) -> Option<Box<dyn RenderSurface>> {
        self.flush_viewport();
        self.manager.detach_all();
        self.surface.take()
    }

    pub fn is_attached(&self) -> bool {
        self.surface.is_attached()
    }

    // ---------------------------------------------------------------------
    // Base style

    pub fn set_base(&self, id: &str) -> bool {
        if let Err(err) = self.store.set_base(id) {
            err.report();
            return false;
        }
        if let Err(err) = self.manager.set_base(id) {
            err.report();
        }
        true
    }

    // ---------------------------------------------------------------------
    // Overlays

    /// User toggle of a single overlay
    pub async fn toggle_overlay(&self, id: &str, visible: bool) -> ToggleOutcome {
        self.set_overlay_visibility(id, visible, true).await
    }

    /// Shows or hides an overlay. Forced overrides and pan hints apply only
    /// when `is_user_interaction` is set (or the overlay forces them always).
    pub async fn set_overlay_visibility(&self, id: &str, visible: bool, is_user_interaction: bool) -> ToggleOutcome {
        if !self.registry.contains(id) {
            ControlError::UnknownOverlay(id.to_owned()).report();
            return ToggleOutcome::Ignored;
        }

        if !visible {
            self.manager.hide(id);
            if let Err(err) = self.store.set_overlay_state(id, StatePatch::visible(false)) {
                err.report();
            }
            return ToggleOutcome::Hidden;
        }

        if let Err(err) = self.store.set_overlay_state(id, StatePatch::visible(true)) {
            err.report();
            return ToggleOutcome::Ignored;
        }
        if !self.surface.is_attached() {
            return ToggleOutcome::Recorded;
        }
        let outcome = self.manager.show(id, is_user_interaction).await;
        self.settle(id, outcome);
        outcome.into()
    }

    /// A failed show leaves the overlay off, unless another call still owns
    /// the in-flight load.
    fn settle(&self, id: &str, outcome: ShowOutcome) {
        if outcome == ShowOutcome::Failed && !self.manager.is_loading(id) && self.store.is_visible(id) {
            if let Err(err) = self.store.set_overlay_state(id, StatePatch::visible(false)) {
                err.report();
            }
        }
    }

    pub fn set_overlay_opacity(&self, id: &str, opacity: f32) -> bool {
        let opacity = match validate_opacity(id, opacity) {
            Ok(opacity) => opacity,
            Err(err) => {
                err.report();
                return false;
            }
        };
        if let Err(err) = self.store.set_overlay_state(id, StatePatch::opacity(opacity)) {
            err.report();
            return false;
        }
        self.manager.apply_opacity(id, opacity);
        true
    }

    /// Clears a load failure and tries to show the overlay again
    pub async fn retry_overlay(&self, id: &str) -> ToggleOutcome {
        if !self.registry.contains(id) {
            ControlError::UnknownOverlay(id.to_owned()).report();
            return ToggleOutcome::Ignored;
        }
        self.manager.retry(id);
        self.set_overlay_visibility(id, true, true).await
    }

    /// Drops cached deferred content; it is loaded again on the next show
    pub fn invalidate_overlay(&self, id: &str) {
        self.manager.invalidate(id);
    }

    /// Adds an overlay at runtime. Default-visible overlays are shown right away.
    pub async fn add_overlay(&self, config: OverlayConfig) -> ToggleOutcome {
        if config.id.is_empty() || self.registry.contains(&config.id) {
            log::warn!("Cannot add overlay with empty or duplicate id '{}'", config.id);
            return ToggleOutcome::Ignored;
        }
        let id = config.id.clone();
        let defaults = OverlayState::new(config.default_visible, config.default_opacity);
        if let Err(err) = self.store.add_overlay(&id, config.group.as_deref(), defaults) {
            err.report();
            return ToggleOutcome::Ignored;
        }
        self.registry.insert(config);

        if !defaults.visible {
            return ToggleOutcome::Hidden;
        }
        if !self.surface.is_attached() {
            return ToggleOutcome::Recorded;
        }
        let outcome = self.manager.show(&id, false).await;
        self.settle(&id, outcome);
        outcome.into()
    }

    pub fn remove_overlay(&self, id: &str) -> bool {
        if !self.registry.contains(id) {
            ControlError::UnknownOverlay(id.to_owned()).report();
            return false;
        }
        self.manager.forget(id);
        self.registry.remove(id);
        if let Err(err) = self.store.remove_overlay(id) {
            err.report();
        }
        true
    }

    pub fn remove_all_overlays(&self) {
        for id in self.registry.ids() {
            self.remove_overlay(&id);
        }
    }

    // ---------------------------------------------------------------------
    // Groups

    /// Shows or hides every member in configuration order, one after the
    /// other, then records the group flag.
    pub async fn toggle_overlay_group(&self, group: &str, visible: bool) -> GroupToggleOutcome {
        let mut outcome = GroupToggleOutcome {
            group_id: group.to_owned(),
            members: Vec::new(),
        };
        let members = self.registry.group_members(group);
        if members.is_empty() {
            ControlError::UnknownGroup(group.to_owned()).report();
            return outcome;
        }

        for id in members {
            let result = self.set_overlay_visibility(&id, visible, false).await;
            outcome.members.push((id, result));
        }
        if let Err(err) = self.store.set_group_state(group, StatePatch::visible(visible)) {
            err.report();
        }
        outcome
    }

    /// Records the group opacity and applies it to every member
    pub fn set_group_opacity(&self, group: &str, opacity: f32) -> bool {
        let opacity = match validate_opacity(group, opacity) {
            Ok(opacity) => opacity,
            Err(err) => {
                err.report();
                return false;
            }
        };
        if let Err(err) = self.store.set_group_state(group, StatePatch::opacity(opacity)) {
            err.report();
            return false;
        }
        for id in self.registry.group_members(group) {
            self.set_overlay_opacity(&id, opacity);
        }
        true
    }

    // ---------------------------------------------------------------------
    // Whole state

    pub fn get_state(&self) -> ControlState {
        self.store.get_state()
    }

    /// Applies a bulk update: base, viewport, group records, then overlays.
    ///
    /// Group records are written as given; member overlays only change
    /// through their own entries in `patch.overlays`.
    pub async fn set_state(&self, patch: ControlStatePatch) {
        if let Some(base) = &patch.base_id {
            self.set_base(base);
        }
        if let Some(viewport) = patch.viewport {
            self.store.set_viewport(viewport);
            if self.surface.with(|surface| surface.jump_to(&viewport)).is_some() {
                self.manager.update_all_zoom_filtering();
            }
        }
        for (group, group_patch) in &patch.groups {
            if let Err(err) = self.store.set_group_state(group, *group_patch) {
                err.report();
            }
        }
        for (id, overlay_patch) in &patch.overlays {
            if let Some(opacity) = overlay_patch.opacity {
                self.set_overlay_opacity(id, opacity);
            }
            if let Some(visible) = overlay_patch.visible {
                if self.store.overlay_state(id).map(|state| state.visible) != Some(visible) {
                    self.set_overlay_visibility(id, visible, false).await;
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Camera and surface notifications

    /// The camera stopped moving; persist the viewport once it stays put.
    pub fn handle_move_end(&self) {
        self.handle_move_end_at(time::current_time_secs());
    }

    pub fn handle_move_end_at(&self, now: f64) {
        if let Some(viewport) = self.surface.viewport() {
            self.viewport_writes.lock().schedule(viewport, now);
        }
    }

    /// Writes a settled viewport. Returns true if one was written.
    pub fn poll_persistence(&self) -> bool {
        self.poll_persistence_at(time::current_time_secs())
    }

    pub fn poll_persistence_at(&self, now: f64) -> bool {
        let ready = self.viewport_writes.lock().take_ready(now);
        self.write_viewport(ready)
    }

    /// Writes a pending viewport without waiting for the quiet period
    pub fn flush_viewport(&self) -> bool {
        let pending = self.viewport_writes.lock().flush();
        self.write_viewport(pending)
    }

    fn write_viewport(&self, viewport: Option<Viewport>) -> bool {
        match viewport {
            Some(viewport) => {
                self.store.set_viewport(ViewportPatch::from(viewport));
                true
            }
            None => false,
        }
    }

    /// The camera finished a zoom change
    pub fn handle_zoom_end(&self) {
        self.manager.update_all_zoom_filtering();
    }

    /// The surface reloaded its style on its own and lost all content
    pub fn handle_style_reload(&self) {
        self.manager.handle_style_reload();
    }

    /// Reorders attached content to match the layer order
    pub fn reposition(&self) {
        self.manager.reposition();
    }

    // ---------------------------------------------------------------------
    // Events and persistence

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self, kind: EventKind, handler: impl EventHandler + 'static) -> SubscriptionId {
        self.bus.subscribe(kind, handler)
    }

    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(kind, id)
    }

    /// Deletes the persisted record; the current state stays as it is
    pub fn clear_persisted(&self) {
        self.store.clear_persisted();
    }

    pub fn restore_report(&self) -> RestoreReport {
        self.store.restore_report()
    }

    // ---------------------------------------------------------------------
    // Queries

    pub fn options(&self) -> &ControlOptions {
        &self.options
    }

    pub fn bases(&self) -> &[BaseStyle] {
        &self.options.bases
    }

    pub fn base_id(&self) -> Option<String> {
        self.store.base_id()
    }

    pub fn overlays(&self) -> Vec<OverlayConfig> {
        self.registry.all()
    }

    pub fn overlay_state(&self, id: &str) -> Option<OverlayState> {
        self.store.overlay_state(id)
    }

    pub fn group_state(&self, id: &str) -> Option<GroupState> {
        self.store.group_state(id)
    }

    /// Group ids in order of first appearance among the overlays
    pub fn group_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.registry
            .all()
            .into_iter()
            .filter_map(|overlay| overlay.group)
            .filter(|group| seen.insert(group.clone()))
            .collect()
    }

    pub fn group_label(&self, id: &str) -> String {
        self.options.group_label(id)
    }

    pub fn group_members(&self, id: &str) -> Vec<String> {
        self.registry.group_members(id)
    }

    pub fn overlay_error(&self, id: &str) -> Option<String> {
        self.manager.error(id)
    }

    pub fn is_filtered(&self, id: &str) -> bool {
        self.manager.is_filtered(id)
    }

    pub fn is_loading(&self, id: &str) -> bool {
        self.manager.is_loading(id)
    }
}
