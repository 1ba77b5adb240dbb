//! Error types shared across puck crates

use thiserror::Error;

/// Result type alias for shared puck operations
pub type Result<T> = std::result::Result<T, PuckError>;

/// Errors raised by the shared utilities
#[derive(Error, Debug)]
pub enum PuckError {
    #[error("Template '{template}' has no value for placeholder '{placeholder}'")]
    MissingPlaceholder {
        template: String,
        placeholder: String,
    },

    #[error("Template '{template}' is malformed: {reason}")]
    MalformedTemplate { template: String, reason: String },
}
