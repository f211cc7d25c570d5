use std::sync::Arc;

use futures::executor::block_on;
use parking_lot::Mutex;

use map_layer_control::state::{OverlayState, StatePatch};
use map_layer_control::{
    BaseStyle, ContentItem, ContentKind, ControlEvent, ControlOptions, ControlStatePatch, EventKind, LayerControl,
    MemoryStorage, MemorySurface, OverlayConfig, RenderSurface, Storage, ToggleOutcome, Viewport, ViewportPatch,
};

const KEY: &str = "layers";

fn surface() -> MemorySurface {
    let labels = vec![
        ContentItem::new("land", ContentKind::Background),
        ContentItem::new("place-labels", ContentKind::Symbol),
    ];
    MemorySurface::new()
        .with_style_layers("streets", labels.clone())
        .with_style_layers("dark", labels)
        .with_viewport(Viewport {
            center: Some([0.0, 0.0]),
            zoom: Some(8.0),
            ..Default::default()
        })
}

fn overlay(id: &str) -> OverlayConfig {
    OverlayConfig::new(id, id.to_uppercase(), vec![ContentItem::new(format!("{}-fill", id), ContentKind::Fill)])
}

fn options() -> ControlOptions {
    ControlOptions {
        bases: vec![
            BaseStyle::new("streets", "Streets", "streets.json"),
            BaseStyle::new("dark", "Dark", "dark.json"),
        ],
        overlays: vec![overlay("a").with_group("g"), overlay("b").with_group("g"), overlay("c")],
        default_viewport: Viewport {
            center: Some([10.0, 50.0]),
            zoom: Some(4.0),
            ..Default::default()
        },
        ..Default::default()
    }
    .with_persistence(KEY)
}

fn record_all(control: &LayerControl, kinds: &[EventKind]) -> Arc<Mutex<Vec<ControlEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    for kind in kinds {
        let sink = events.clone();
        control.subscribe(*kind, move |event: &ControlEvent| sink.lock().push(event.clone()));
    }
    events
}

#[test]
fn test_overlay_change_then_change() {
    let control = LayerControl::new(options(), None);
    let events = record_all(&control, &[EventKind::OverlayChange, EventKind::Change]);

    assert_eq!(block_on(control.toggle_overlay("a", true)), ToggleOutcome::Recorded);

    let events = events.lock();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0],
        ControlEvent::OverlayChange {
            id: "a".into(),
            visible: true,
            opacity: 1.0,
            previous_visible: false,
            previous_opacity: 1.0,
        }
    );
    assert!(matches!(&events[1], ControlEvent::Change(state) if state.overlays["a"].visible));
}

#[test]
fn test_group_toggle_shows_members() {
    let control = LayerControl::new(options(), None);
    let groups = record_all(&control, &[EventKind::OverlayGroupChange]);
    let map = surface();
    block_on(control.attach(Box::new(map.clone())));

    let outcome = block_on(control.toggle_overlay_group("g", true));
    assert_eq!(outcome.outcome_of("a"), Some(ToggleOutcome::Shown));
    assert_eq!(outcome.outcome_of("b"), Some(ToggleOutcome::Shown));
    assert!(control.overlay_state("a").unwrap().visible);
    assert!(control.overlay_state("b").unwrap().visible);
    assert!(control.group_state("g").unwrap().visible);
    assert_eq!(map.content_ids(), vec!["a-fill", "b-fill"]);

    let groups = groups.lock();
    assert!(matches!(
        &groups[0],
        ControlEvent::OverlayGroupChange { group_id, visible: true, overlays, .. }
            if group_id == "g" && overlays == &["a".to_owned(), "b".to_owned()]
    ));
}

#[test]
fn test_group_toggle_continues_past_failures() {
    let control = LayerControl::new(options(), None);
    let map = surface();
    map.reject_content("a-fill");
    block_on(control.attach(Box::new(map.clone())));

    let outcome = block_on(control.toggle_overlay_group("g", true));
    assert_eq!(outcome.outcome_of("a"), Some(ToggleOutcome::Failed));
    assert_eq!(outcome.outcome_of("b"), Some(ToggleOutcome::Shown));
    assert!(control.overlay_error("a").is_some());
    assert_eq!(map.content_ids(), vec!["b-fill"]);
}

#[test]
fn test_group_opacity_cascades() {
    let control = LayerControl::new(options(), None);
    let map = surface();
    block_on(control.attach(Box::new(map.clone())));
    block_on(control.toggle_overlay_group("g", true));

    assert!(control.set_group_opacity("g", 0.4));
    assert_eq!(control.group_state("g").unwrap().opacity, 0.4);
    assert_eq!(control.overlay_state("b").unwrap().opacity, 0.4);
    assert_eq!(map.content("a-fill").unwrap().opacity, 0.4);
    assert_eq!(control.overlay_state("c").unwrap().opacity, 1.0);
}

#[test]
fn test_set_state_does_not_cascade_groups() {
    let control = LayerControl::new(options(), None);
    let map = surface();
    block_on(control.attach(Box::new(map.clone())));

    let mut patch = ControlStatePatch {
        base_id: Some("dark".into()),
        viewport: Some(ViewportPatch {
            zoom: Some(9.0),
            ..Default::default()
        }),
        ..Default::default()
    };
    patch.groups.insert("g".into(), StatePatch::visible(true));
    patch.overlays.insert("a".into(), StatePatch::visible(true));
    block_on(control.set_state(patch));

    let state = control.get_state();
    assert_eq!(state.base_id.as_deref(), Some("dark"));
    assert!(state.groups["g"].visible);
    assert_eq!(state.overlays["a"], OverlayState::new(true, 1.0));
    assert!(!state.overlays["b"].visible);
    assert_eq!(state.viewport.zoom, Some(9.0));
    assert_eq!(map.viewport().zoom, Some(9.0));
    assert_eq!(map.style().as_deref(), Some("dark"));
    assert_eq!(map.content_ids(), vec!["a-fill"]);
}

#[test]
fn test_intent_recorded_before_attach() {
    let control = LayerControl::new(options(), None);
    assert_eq!(block_on(control.toggle_overlay("c", true)), ToggleOutcome::Recorded);
    assert!(!control.is_attached());

    let map = surface();
    block_on(control.attach(Box::new(map.clone())));
    assert_eq!(map.style().as_deref(), Some("streets"));
    assert_eq!(map.content_ids(), vec!["c-fill"]);
    // The stored default viewport is applied on attach
    assert_eq!(map.viewport().center, Some([10.0, 50.0]));

    let detached = control.detach();
    assert!(detached.is_some());
    assert!(map.content_ids().is_empty());
    assert!(control.overlay_state("c").unwrap().visible);
}

#[test]
fn test_unknown_ids_are_ignored() {
    let control = LayerControl::new(options(), None);
    let events = record_all(&control, &[EventKind::Change]);

    assert_eq!(block_on(control.toggle_overlay("ghost", true)), ToggleOutcome::Ignored);
    assert!(block_on(control.toggle_overlay_group("nope", true)).members.is_empty());
    assert!(!control.set_overlay_opacity("ghost", 0.5));
    assert!(!control.set_base("terrain"));
    assert!(!control.remove_overlay("ghost"));
    assert_eq!(block_on(control.retry_overlay("ghost")), ToggleOutcome::Ignored);
    assert!(events.lock().is_empty());
}

#[test]
fn test_add_and_remove_overlays() {
    let control = LayerControl::new(options(), None);
    let map = surface();
    block_on(control.attach(Box::new(map.clone())));

    assert_eq!(block_on(control.add_overlay(overlay("d").visible(true))), ToggleOutcome::Shown);
    assert_eq!(map.content_ids(), vec!["d-fill"]);
    assert_eq!(block_on(control.add_overlay(overlay("d"))), ToggleOutcome::Ignored);
    assert_eq!(control.get_state().layer_order, vec!["d"]);

    assert!(control.remove_overlay("d"));
    assert!(map.content_ids().is_empty());
    assert!(!control.get_state().overlays.contains_key("d"));

    control.remove_all_overlays();
    let state = control.get_state();
    assert!(state.overlays.is_empty());
    assert!(state.groups.is_empty());
    assert!(control.overlays().is_empty());
}

#[test]
fn test_unsubscribe() {
    let control = LayerControl::new(options(), None);
    let hits = Arc::new(Mutex::new(0));
    let sink = hits.clone();
    let id = control.subscribe(EventKind::BaseChange, move |_: &ControlEvent| *sink.lock() += 1);

    control.set_base("dark");
    assert!(control.unsubscribe(EventKind::BaseChange, id));
    control.set_base("streets");
    assert_eq!(*hits.lock(), 1);
    assert!(!control.unsubscribe(EventKind::BaseChange, id));
}

#[test]
fn test_state_survives_restart() {
    let storage = Arc::new(MemoryStorage::new());
    let control = LayerControl::new(options(), Some(storage.clone()));
    let map = surface();
    block_on(control.attach(Box::new(map.clone())));

    control.set_base("dark");
    block_on(control.toggle_overlay("c", true));
    block_on(control.toggle_overlay("a", true));
    control.set_overlay_opacity("a", 0.6);

    assert_eq!(LayerControl::initial_base(&options(), Some(&*storage)).as_deref(), Some("dark"));

    let restored = LayerControl::new(options(), Some(storage.clone()));
    let state = restored.get_state();
    assert_eq!(state.base_id.as_deref(), Some("dark"));
    assert_eq!(state.overlays["a"], OverlayState::new(true, 0.6));
    assert_eq!(state.layer_order, vec!["c", "a"]);
    assert!(restored.restore_report().is_clean());

    let map = surface();
    block_on(restored.attach(Box::new(map.clone())));
    assert_eq!(map.content_ids(), vec!["c-fill", "a-fill"]);
    assert_eq!(map.content("a-fill").unwrap().opacity, 0.6);
}

#[test]
fn test_viewport_writes_are_debounced() {
    let storage = Arc::new(MemoryStorage::new());
    let control = LayerControl::new(options(), Some(storage.clone()));
    let viewports = record_all(&control, &[EventKind::ViewportChange]);
    let map = surface();
    block_on(control.attach(Box::new(map.clone())));

    map.set_viewport(Viewport {
        center: Some([1.0, 2.0]),
        zoom: Some(6.0),
        ..Default::default()
    });
    control.handle_move_end_at(10.0);
    map.set_zoom(7.0);
    control.handle_move_end_at(10.2);

    assert!(!control.poll_persistence_at(10.5));
    assert!(viewports.lock().is_empty());
    assert!(control.poll_persistence_at(10.8));
    assert_eq!(viewports.lock().len(), 1);
    assert!(!control.poll_persistence_at(12.0));

    let restored = LayerControl::initial_viewport(&options(), Some(&*storage));
    assert_eq!(restored.center, Some([1.0, 2.0]));
    assert_eq!(restored.zoom, Some(7.0));
}

#[test]
fn test_detach_flushes_pending_viewport() {
    let storage = Arc::new(MemoryStorage::new());
    let control = LayerControl::new(options(), Some(storage.clone()));
    let map = surface();
    block_on(control.attach(Box::new(map.clone())));

    map.set_zoom(11.0);
    control.handle_move_end_at(0.0);
    control.detach();
    assert_eq!(LayerControl::initial_viewport(&options(), Some(&*storage)).zoom, Some(11.0));
}

#[test]
fn test_ghost_overlay_in_record_is_dropped() {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .set_item(
            KEY,
            r#"{"baseId": "dark", "overlays": {"ghost": {"visible": true, "opacity": 1}}, "layerOrder": ["ghost"]}"#,
        )
        .unwrap();

    let control = LayerControl::new(options(), Some(storage));
    let state = control.get_state();
    assert_eq!(state.base_id.as_deref(), Some("dark"));
    assert!(!state.overlays.contains_key("ghost"));
    assert!(state.layer_order.is_empty());
    assert_eq!(control.restore_report().dropped_overlays, vec!["ghost"]);
}

#[test]
fn test_unreadable_record_keeps_defaults() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set_item(KEY, "not json").unwrap();

    let control = LayerControl::new(options(), Some(storage.clone()));
    assert_eq!(control.get_state().base_id.as_deref(), Some("streets"));
    assert!(control.restore_report().read_error.is_some());
    assert_eq!(LayerControl::initial_base(&options(), Some(&*storage)).as_deref(), Some("streets"));
}

#[test]
fn test_clear_persisted() {
    let storage = Arc::new(MemoryStorage::new());
    let control = LayerControl::new(options(), Some(storage.clone()));
    let cleared = record_all(&control, &[EventKind::MemoryCleared]);
    control.set_base("dark");
    assert!(!storage.is_empty());

    control.clear_persisted();
    assert!(storage.is_empty());
    assert_eq!(control.base_id().as_deref(), Some("dark"));
    assert_eq!(
        cleared.lock().as_slice(),
        &[ControlEvent::MemoryCleared { key: KEY.into() }]
    );
}
