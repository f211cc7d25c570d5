use thiserror::Error;

use crate::surface::SurfaceError;

/// Errors raised by the layer control.
///
/// None of these ever escape the [`crate::LayerControl`] facade: configuration
/// errors are logged and turned into no-ops, load and surface failures are
/// recorded per overlay and surfaced as `error` events.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Unknown overlay: {0}")]
    UnknownOverlay(String),

    #[error("Unknown overlay group: {0}")]
    UnknownGroup(String),

    #[error("Unknown base style: {0}")]
    UnknownBase(String),

    #[error("Invalid opacity for {id}: {value}")]
    InvalidOpacity { id: String, value: f32 },

    #[error("Failed to load overlay {id}: {message}")]
    Load { id: String, message: String },

    #[error("Render surface rejected overlay {id}: {source}")]
    Surface {
        id: String,
        #[source]
        source: SurfaceError,
    },
}

/// Result type for layer control operations
pub type ControlResult<T> = Result<T, ControlError>;

impl ControlError {
    /// True for the errors that come from a caller naming something that is
    /// not configured.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownOverlay(_) | Self::UnknownGroup(_) | Self::UnknownBase(_) | Self::InvalidOpacity { .. }
        )
    }

    /// Logs a warning for configuration errors and an error for everything else
    pub fn report(&self) {
        if self.is_configuration() {
            log::warn!("{}", self);
        } else {
            log::error!("{}", self);
        }
    }
}

/// Checks an opacity value, clamping it into `[0, 1]`.
///
/// NaN has no sensible clamp and is rejected.
pub fn validate_opacity(id: &str, value: f32) -> ControlResult<f32> {
    if value.is_nan() {
        return Err(ControlError::InvalidOpacity { id: id.to_owned(), value });
    }
    Ok(value.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opacity_clamped() {
        assert_eq!(validate_opacity("a", 0.5).unwrap(), 0.5);
        assert_eq!(validate_opacity("a", 1.7).unwrap(), 1.0);
        assert_eq!(validate_opacity("a", -0.2).unwrap(), 0.0);
    }

    #[test]
    fn test_nan_opacity_rejected() {
        let err = validate_opacity("a", f32::NAN).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_runtime_failures_are_not_configuration() {
        let err = ControlError::Load {
            id: "a".into(),
            message: "boom".into(),
        };
        assert!(!err.is_configuration());
        assert_eq!(err.to_string(), "Failed to load overlay a: boom");
        assert!(ControlError::UnknownBase("x".into()).is_configuration());
    }
}
