//! Error types for pinpoint.

use thiserror::Error;

/// Main error type for pinpoint operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Element not found by fixture key
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Page fixture is structurally invalid
    #[error("Invalid fixture: {0}")]
    InvalidFixture(String),

    /// Event kind name outside the bus vocabulary
    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_not_found_error() {
        let err = Error::ElementNotFound("save-button".to_string());
        assert_eq!(err.to_string(), "Element not found: save-button");
    }

    #[test]
    fn test_invalid_fixture_error() {
        let err = Error::InvalidFixture("duplicate key: root".to_string());
        assert_eq!(err.to_string(), "Invalid fixture: duplicate key: root");
    }

    #[test]
    fn test_unknown_event_kind_error() {
        let err = Error::UnknownEventKind("modal:explode".to_string());
        assert_eq!(err.to_string(), "Unknown event kind: modal:explode");
    }

    #[test]
    fn test_config_error() {
        let err = Error::Config("touch_debounce_ms must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: touch_debounce_ms must be > 0"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<i32>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_err = serde_yaml::from_str::<Vec<u32>>("{ not: [a list").unwrap_err();
        let err: Error = yaml_err.into();
        assert!(matches!(err, Error::Yaml(_)));
    }
}
