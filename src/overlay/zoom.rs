use serde::{Deserialize, Serialize};

/// Zoom levels an overlay renders at: `min <= zoom < max`, either bound optional
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ZoomRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, zoom: f64) -> bool {
        self.min.is_none_or(|min| zoom >= min) && self.max.is_none_or(|max| zoom < max)
    }

    /// An unknown zoom never filters anything out
    pub fn admits(&self, zoom: Option<f64>) -> bool {
        zoom.is_none_or(|zoom| self.contains(zoom))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_open_range() {
        let range = ZoomRange::new(Some(5.0), Some(10.0));
        assert!(range.contains(7.0));
        assert!(range.contains(5.0));
        assert!(!range.contains(4.0));
        assert!(!range.contains(10.0));
    }

    #[test]
    fn test_single_bounds() {
        assert!(ZoomRange::new(Some(3.0), None).contains(22.0));
        assert!(!ZoomRange::new(None, Some(3.0)).contains(3.0));
        assert!(ZoomRange::default().contains(0.0));
        assert!(ZoomRange::default().is_unbounded());
        assert!(!ZoomRange::new(None, Some(3.0)).is_unbounded());
        assert!(ZoomRange::new(Some(3.0), None).admits(None));
    }
}
