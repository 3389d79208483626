//! Screenshot capture interface.
//!
//! Pixel capture lives outside this workspace. The engine only calls a
//! [`ScreenshotCapturer`] and forwards whatever it returns.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ElementId;

/// Captured image of an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Encoded image as a data URL
    pub data_url: String,
}

/// Typed reason a capture failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "kebab-case")]
pub enum CaptureError {
    /// A cross-origin resource blocked pixel access
    #[error("cross-origin restriction: {0}")]
    CrossOrigin(String),
    /// The canvas became tainted during rendering
    #[error("canvas tainted")]
    Tainted,
    /// The environment cannot capture this element
    #[error("capture unsupported: {0}")]
    Unsupported(String),
    /// Any other capture failure
    #[error("capture failed: {0}")]
    Other(String),
}

/// Result of one capture attempt.
pub type CaptureOutcome = Result<Screenshot, CaptureError>;

/// External screenshot renderer.
pub trait ScreenshotCapturer {
    /// Capture the given element.
    fn capture(&self, element: ElementId) -> CaptureOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_display() {
        let err = CaptureError::CrossOrigin("https://cdn.example.com/a.png".to_string());
        assert_eq!(
            err.to_string(),
            "cross-origin restriction: https://cdn.example.com/a.png"
        );
        assert_eq!(CaptureError::Tainted.to_string(), "canvas tainted");
    }

    #[test]
    fn test_capture_error_serialization() {
        let json = serde_json::to_value(CaptureError::Unsupported("svg".to_string())).unwrap();
        assert_eq!(json["reason"], "unsupported");
        assert_eq!(json["detail"], "svg");

        let json = serde_json::to_value(CaptureError::Tainted).unwrap();
        assert_eq!(json["reason"], "tainted");
    }
}
