// Crate-wide error type. Every stage of the render pipeline reports failures
// through this enum so the orchestration layer can convert them into failed
// composite results without losing the failure class.

use std::fmt;

/// The failure classes a composite job can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The polygon mask is degenerate: fewer than three vertices, or a
    /// zero-length edge in the closed ring.
    InvalidMask(String),
    /// The mask covers zero photo pixels at or above the alpha threshold.
    EmptyRegion,
    /// The material's reference texture could not be fetched, decoded, or
    /// scaled to a usable tile.
    MaterialUnavailable(String),
    /// The requested blend strength is non-finite or outside [0, 1].
    InvalidStrength(f64),
    /// The finished raster could not be serialized for transport.
    EncodingFailure(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InvalidMask(reason) => write!(f, "invalid mask: {reason}"),
            RenderError::EmptyRegion => {
                write!(f, "mask covers no photo pixels above the alpha threshold")
            }
            RenderError::MaterialUnavailable(reason) => {
                write!(f, "material unavailable: {reason}")
            }
            RenderError::InvalidStrength(strength) => {
                write!(f, "strength {strength} is outside the accepted range [0, 1]")
            }
            RenderError::EncodingFailure(reason) => write!(f, "encoding failed: {reason}"),
        }
    }
}

impl std::error::Error for RenderError {}
