use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{RenderSurface, SurfaceError};
use crate::config::BaseStyle;
use crate::overlay::ContentItem;
use crate::state::{Viewport, ViewportPatch};

#[derive(Debug, Clone)]
struct StackEntry {
    item: ContentItem,
    from_style: bool,
}

#[derive(Debug, Default)]
struct MemorySurfaceInner {
    style: Option<String>,
    style_layers: HashMap<String, Vec<ContentItem>>,
    stack: Vec<StackEntry>,
    viewport: Viewport,
    rejected_content: HashSet<String>,
    rejected_styles: HashSet<String>,
    style_loads: usize,
}

impl MemorySurfaceInner {
    fn position(&self, id: &str) -> Option<usize> {
        self.stack.iter().position(|entry| entry.item.id == id)
    }

    fn insert_before(&mut self, entry: StackEntry, before: Option<&str>) -> Result<(), SurfaceError> {
        match before {
            Some(anchor) => {
                let index = self
                    .position(anchor)
                    .ok_or_else(|| SurfaceError::MissingContent(anchor.to_owned()))?;
                self.stack.insert(index, entry);
            }
            None => self.stack.push(entry),
        }
        Ok(())
    }
}

/// A render surface that keeps its layer stack in memory.
///
/// Clones share the same stack, so one clone can be attached to the control
/// while another is used to draw or inspect it.
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    inner: Arc<Mutex<MemorySurfaceInner>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layers that come with a base style, bottom to top
    pub fn with_style_layers(self, base_id: impl Into<String>, layers: Vec<ContentItem>) -> Self {
        self.inner.lock().style_layers.insert(base_id.into(), layers);
        self
    }

    pub fn with_viewport(self, viewport: Viewport) -> Self {
        self.inner.lock().viewport = viewport;
        self
    }

    /// Makes adding the content item `id` fail
    pub fn reject_content(&self, id: impl Into<String>) {
        self.inner.lock().rejected_content.insert(id.into());
    }

    /// Makes loading the style `base_id` fail
    pub fn reject_style(&self, base_id: impl Into<String>) {
        self.inner.lock().rejected_styles.insert(base_id.into());
    }

    pub fn style(&self) -> Option<String> {
        self.inner.lock().style.clone()
    }

    pub fn style_loads(&self) -> usize {
        self.inner.lock().style_loads
    }

    pub fn set_zoom(&self, zoom: f64) {
        self.inner.lock().viewport.zoom = Some(zoom);
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.inner.lock().viewport = viewport;
    }

    /// Every layer id on the map, bottom to top
    pub fn layer_ids(&self) -> Vec<String> {
        self.inner.lock().stack.iter().map(|entry| entry.item.id.clone()).collect()
    }

    /// Ids of content added by the control, bottom to top
    pub fn content_ids(&self) -> Vec<String> {
        self.inner
            .lock()
            .stack
            .iter()
            .filter(|entry| !entry.from_style)
            .map(|entry| entry.item.id.clone())
            .collect()
    }

    pub fn content(&self, id: &str) -> Option<ContentItem> {
        let inner = self.inner.lock();
        inner.position(id).map(|index| inner.stack[index].item.clone())
    }

    /// Full stack with a flag telling style layers apart from overlay content
    pub fn stack(&self) -> Vec<(ContentItem, bool)> {
        self.inner
            .lock()
            .stack
            .iter()
            .map(|entry| (entry.item.clone(), entry.from_style))
            .collect()
    }
}

impl RenderSurface for MemorySurface {
    fn set_style(&mut self, base: &BaseStyle) -> Result<(), SurfaceError> {
        let mut inner = self.inner.lock();
        if inner.rejected_styles.contains(&base.id) {
            return Err(SurfaceError::StyleUnavailable(base.id.clone()));
        }
        let layers = inner.style_layers.get(&base.id).cloned().unwrap_or_default();
        inner.stack = layers
            .into_iter()
            .map(|item| StackEntry { item, from_style: true })
            .collect();
        inner.style = Some(base.id.clone());
        inner.style_loads += 1;
        Ok(())
    }

    fn add_content(&mut self, item: ContentItem, before: Option<&str>) -> Result<(), SurfaceError> {
        let mut inner = self.inner.lock();
        if inner.position(&item.id).is_some() {
            return Err(SurfaceError::DuplicateContent(item.id));
        }
        if inner.rejected_content.contains(&item.id) {
            return Err(SurfaceError::Rejected(format!("content '{}' failed to render", item.id)));
        }
        inner.insert_before(StackEntry { item, from_style: false }, before)
    }

    fn remove_content(&mut self, item_id: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.position(item_id) {
            Some(index) => {
                inner.stack.remove(index);
                true
            }
            None => false,
        }
    }

    fn has_content(&self, item_id: &str) -> bool {
        self.inner.lock().position(item_id).is_some()
    }

    fn replace_content(&mut self, item: ContentItem) -> Result<(), SurfaceError> {
        let mut inner = self.inner.lock();
        let index = inner
            .position(&item.id)
            .ok_or_else(|| SurfaceError::MissingContent(item.id.clone()))?;
        inner.stack[index].item = item;
        Ok(())
    }

    fn move_content(&mut self, item_id: &str, before: Option<&str>) -> Result<(), SurfaceError> {
        let mut inner = self.inner.lock();
        if before == Some(item_id) {
            return Ok(());
        }
        if let Some(anchor) = before {
            if inner.position(anchor).is_none() {
                return Err(SurfaceError::MissingContent(anchor.to_owned()));
            }
        }
        let index = inner
            .position(item_id)
            .ok_or_else(|| SurfaceError::MissingContent(item_id.to_owned()))?;
        let entry = inner.stack.remove(index);
        inner.insert_before(entry, before)
    }

    fn first_label_layer(&self) -> Option<String> {
        self.inner
            .lock()
            .stack
            .iter()
            .find(|entry| entry.from_style && entry.item.kind.is_label_bearing())
            .map(|entry| entry.item.id.clone())
    }

    fn viewport(&self) -> Viewport {
        self.inner.lock().viewport
    }

    fn jump_to(&mut self, patch: &ViewportPatch) {
        let mut inner = self.inner.lock();
        inner.viewport = inner.viewport.merged(patch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::ContentKind;

    fn streets() -> BaseStyle {
        BaseStyle::new("streets", "Streets", "https://tiles.example.com/streets.json")
    }

    fn surface() -> MemorySurface {
        MemorySurface::new().with_style_layers(
            "streets",
            vec![
                ContentItem::new("land", ContentKind::Background),
                ContentItem::new("roads", ContentKind::Line),
                ContentItem::new("place-labels", ContentKind::Symbol),
            ],
        )
    }

    #[test]
    fn test_style_switch_drops_content() {
        let mut map = surface();
        map.set_style(&streets()).unwrap();
        map.add_content(ContentItem::new("rivers", ContentKind::Line), None).unwrap();
        assert_eq!(map.content_ids(), vec!["rivers"]);

        map.set_style(&streets()).unwrap();
        assert!(map.content_ids().is_empty());
        assert_eq!(map.style_loads(), 2);
    }

    #[test]
    fn test_insert_before_label_layer() {
        let mut map = surface();
        map.set_style(&streets()).unwrap();
        let anchor = map.first_label_layer();
        assert_eq!(anchor.as_deref(), Some("place-labels"));

        map.add_content(ContentItem::new("a", ContentKind::Fill), anchor.as_deref()).unwrap();
        map.add_content(ContentItem::new("b", ContentKind::Fill), anchor.as_deref()).unwrap();
        assert_eq!(map.layer_ids(), vec!["land", "roads", "a", "b", "place-labels"]);

        map.move_content("a", anchor.as_deref()).unwrap();
        assert_eq!(map.layer_ids(), vec!["land", "roads", "b", "a", "place-labels"]);
    }

    #[test]
    fn test_add_errors() {
        let mut map = surface();
        map.add_content(ContentItem::new("a", ContentKind::Fill), None).unwrap();
        assert_eq!(
            map.add_content(ContentItem::new("a", ContentKind::Fill), None),
            Err(SurfaceError::DuplicateContent("a".into()))
        );
        assert_eq!(
            map.add_content(ContentItem::new("b", ContentKind::Fill), Some("nope")),
            Err(SurfaceError::MissingContent("nope".into()))
        );
        map.reject_content("c");
        assert!(map.add_content(ContentItem::new("c", ContentKind::Fill), None).is_err());
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut map = MemorySurface::new();
        map.add_content(ContentItem::new("a", ContentKind::Fill), None).unwrap();
        map.add_content(ContentItem::new("b", ContentKind::Fill), None).unwrap();
        map.replace_content(ContentItem::new("a", ContentKind::Fill).with_opacity(0.3)).unwrap();
        assert_eq!(map.layer_ids(), vec!["a", "b"]);
        assert_eq!(map.content("a").unwrap().opacity, 0.3);
    }
}
