use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::persistence::{self, Storage};
use super::restore::{self, RestoreReport};
use super::{ControlState, GroupState, OverlayState, StatePatch, Viewport, ViewportPatch};
use crate::config::ControlOptions;
use crate::error::{ControlError, ControlResult, validate_opacity};
use crate::event::{ControlEvent, EventBus};

#[derive(Clone)]
struct Persistence {
    storage: Arc<dyn Storage>,
    key: String,
}

#[derive(Debug)]
struct StoreInner {
    state: ControlState,
    base_ids: Vec<String>,
    /// Overlay id and group, in configuration order
    membership: Vec<(String, Option<String>)>,
    report: RestoreReport,
}

impl StoreInner {
    fn members_of(&self, group: &str) -> Vec<String> {
        self.membership
            .iter()
            .filter(|(_, g)| g.as_deref() == Some(group))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// Single source of truth for base, overlay, group, order and viewport state.
///
/// Every setter persists the full record and then publishes its specific
/// event followed by `change`. Clones share the same state.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Mutex<StoreInner>>,
    bus: EventBus,
    persistence: Option<Persistence>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &self.inner.lock().state)
            .field("persistence_key", &self.persistence.as_ref().map(|p| p.key.as_str()))
            .finish()
    }
}

impl StateStore {
    /// Builds the store from `options` and restores whatever `storage` holds
    /// under the configured key.
    pub fn new(options: &ControlOptions, storage: Option<Arc<dyn Storage>>, bus: EventBus) -> Self {
        let persistence = match (options.persistence_key(), storage) {
            (Some(key), Some(storage)) => Some(Persistence {
                storage,
                key: key.to_owned(),
            }),
            (Some(key), None) => {
                log::warn!("Persistence key '{}' configured without storage, state will not be saved", key);
                None
            }
            _ => None,
        };

        let (state, report) = Self::initial_state(options, persistence.as_ref().map(|p| (&*p.storage, p.key.as_str())));

        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                state,
                base_ids: options.bases.iter().map(|base| base.id.clone()).collect(),
                membership: options
                    .overlays
                    .iter()
                    .map(|overlay| (overlay.id.clone(), overlay.group.clone()))
                    .collect(),
                report,
            })),
            bus,
            persistence,
        }
    }

    /// Computes the state a store would start with, without building one.
    ///
    /// A record that cannot be read leaves the configuration defaults.
    pub fn initial_state(options: &ControlOptions, source: Option<(&dyn Storage, &str)>) -> (ControlState, RestoreReport) {
        let defaults = restore::default_state(options);
        let Some((storage, key)) = source else {
            return (defaults, RestoreReport::default());
        };
        match persistence::load_record(storage, key) {
            Ok(Some(record)) => restore::restore(defaults, record, options),
            Ok(None) => (defaults, RestoreReport::default()),
            Err(err) => {
                log::error!("Failed to restore layer state from '{}': {}", key, err);
                let report = RestoreReport {
                    read_error: Some(err.to_string()),
                    ..Default::default()
                };
                (defaults, report)
            }
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn persistence_key(&self) -> Option<&str> {
        self.persistence.as_ref().map(|p| p.key.as_str())
    }

    /// What restoration dropped when this store was built
    pub fn restore_report(&self) -> RestoreReport {
        self.inner.lock().report.clone()
    }

    /// Copy of the full state; changing it does not affect the store
    pub fn get_state(&self) -> ControlState {
        self.inner.lock().state.clone()
    }

    pub fn base_id(&self) -> Option<String> {
        self.inner.lock().state.base_id.clone()
    }

    pub fn overlay_state(&self, id: &str) -> Option<OverlayState> {
        self.inner.lock().state.overlays.get(id).copied()
    }

    pub fn group_state(&self, id: &str) -> Option<GroupState> {
        self.inner.lock().state.groups.get(id).copied()
    }

    pub fn layer_order(&self) -> Vec<String> {
        self.inner.lock().state.layer_order.clone()
    }

    pub fn viewport(&self) -> Viewport {
        self.inner.lock().state.viewport
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.overlay_state(id).is_some_and(|state| state.visible)
    }

    pub fn group_members(&self, group: &str) -> Vec<String> {
        self.inner.lock().members_of(group)
    }

    pub fn set_base(&self, id: &str) -> ControlResult<()> {
        let (event, snapshot) = {
            let mut inner = self.inner.lock();
            if !inner.base_ids.iter().any(|base| base == id) {
                return Err(ControlError::UnknownBase(id.to_owned()));
            }
            let previous = inner.state.base_id.replace(id.to_owned());
            let event = ControlEvent::BaseChange {
                base_id: id.to_owned(),
                previous_base_id: previous,
            };
            (event, inner.state.clone())
        };
        self.commit(event, snapshot);
        Ok(())
    }

    /// Merges `patch` into the overlay's record.
    ///
    /// Showing moves the overlay to the top of the layer order; hiding
    /// removes it from the order.
    pub fn set_overlay_state(&self, id: &str, patch: StatePatch) -> ControlResult<()> {
        let opacity = patch.opacity.map(|value| validate_opacity(id, value)).transpose()?;
        let patch = StatePatch { opacity, ..patch };

        let (event, snapshot) = {
            let mut inner = self.inner.lock();
            let state = &mut inner.state;
            let previous = *state
                .overlays
                .get(id)
                .ok_or_else(|| ControlError::UnknownOverlay(id.to_owned()))?;
            let next = previous.merged(&patch);
            state.overlays.insert(id.to_owned(), next);

            match (previous.visible, next.visible) {
                (false, true) => {
                    state.layer_order.retain(|other| other != id);
                    state.layer_order.push(id.to_owned());
                }
                (true, false) => state.layer_order.retain(|other| other != id),
                _ => {}
            }

            let event = ControlEvent::OverlayChange {
                id: id.to_owned(),
                visible: next.visible,
                opacity: next.opacity,
                previous_visible: previous.visible,
                previous_opacity: previous.opacity,
            };
            (event, inner.state.clone())
        };
        self.commit(event, snapshot);
        Ok(())
    }

    /// Merges `patch` into the group's own record. Members are left alone.
    pub fn set_group_state(&self, group: &str, patch: StatePatch) -> ControlResult<()> {
        let opacity = patch.opacity.map(|value| validate_opacity(group, value)).transpose()?;
        let patch = StatePatch { opacity, ..patch };

        let (event, snapshot) = {
            let mut inner = self.inner.lock();
            let members = inner.members_of(group);
            let previous = match inner.state.groups.get(group) {
                Some(state) => *state,
                None if !members.is_empty() => GroupState::default(),
                None => return Err(ControlError::UnknownGroup(group.to_owned())),
            };
            let next = previous.merged(&patch);
            inner.state.groups.insert(group.to_owned(), next);
            let event = ControlEvent::OverlayGroupChange {
                group_id: group.to_owned(),
                visible: next.visible,
                opacity: next.opacity,
                overlays: members,
            };
            (event, inner.state.clone())
        };
        self.commit(event, snapshot);
        Ok(())
    }

    /// Changes only the viewport fields present in `patch`
    pub fn set_viewport(&self, patch: ViewportPatch) {
        let (event, snapshot) = {
            let mut inner = self.inner.lock();
            let previous = inner.state.viewport;
            inner.state.viewport = previous.merged(&patch);
            let event = ControlEvent::ViewportChange {
                viewport: inner.state.viewport,
                previous_viewport: previous,
            };
            (event, inner.state.clone())
        };
        self.commit(event, snapshot);
    }

    /// Starts tracking a newly configured overlay with its defaults
    pub fn add_overlay(&self, id: &str, group: Option<&str>, defaults: OverlayState) -> ControlResult<()> {
        let opacity = validate_opacity(id, defaults.opacity)?;
        let snapshot = {
            let mut inner = self.inner.lock();
            if inner.state.overlays.contains_key(id) {
                return Ok(());
            }
            inner
                .state
                .overlays
                .insert(id.to_owned(), OverlayState::new(defaults.visible, opacity));
            if defaults.visible {
                inner.state.layer_order.push(id.to_owned());
            }
            if let Some(group) = group {
                inner.state.groups.entry(group.to_owned()).or_default();
            }
            inner.membership.push((id.to_owned(), group.map(str::to_owned)));
            inner.state.clone()
        };
        self.persist(&snapshot);
        self.bus.publish(ControlEvent::Change(snapshot));
        Ok(())
    }

    /// Stops tracking an overlay. A group left without members goes too.
    pub fn remove_overlay(&self, id: &str) -> ControlResult<()> {
        let snapshot = {
            let mut inner = self.inner.lock();
            if inner.state.overlays.remove(id).is_none() {
                return Err(ControlError::UnknownOverlay(id.to_owned()));
            }
            inner.state.layer_order.retain(|other| other != id);
            let group = inner
                .membership
                .iter()
                .position(|(other, _)| other == id)
                .and_then(|index| inner.membership.remove(index).1);
            if let Some(group) = group {
                if inner.members_of(&group).is_empty() {
                    inner.state.groups.remove(&group);
                }
            }
            inner.state.clone()
        };
        self.persist(&snapshot);
        self.bus.publish(ControlEvent::Change(snapshot));
        Ok(())
    }

    /// Deletes the durable record. In-memory state is untouched.
    pub fn clear_persisted(&self) {
        let Some(persistence) = &self.persistence else {
            log::warn!("No persistence configured, nothing to clear");
            return;
        };
        if let Err(err) = persistence.storage.remove_item(&persistence.key) {
            log::error!("Failed to clear persisted layer state '{}': {}", persistence.key, err);
        }
        self.bus.publish(ControlEvent::MemoryCleared {
            key: persistence.key.clone(),
        });
    }

    /// Snapshot of every overlay record
    pub fn overlay_states(&self) -> BTreeMap<String, OverlayState> {
        self.inner.lock().state.overlays.clone()
    }

    fn commit(&self, event: ControlEvent, snapshot: ControlState) {
        self.persist(&snapshot);
        self.bus.publish(event);
        self.bus.publish(ControlEvent::Change(snapshot));
    }

    fn persist(&self, state: &ControlState) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        if let Err(err) = persistence::save_record(&*persistence.storage, &persistence.key, state) {
            log::error!("Failed to persist layer state '{}': {}", persistence.key, err);
        }
    }
}
