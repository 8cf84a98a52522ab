//! Error types for reactor operations.

use thiserror::Error;

/// Main error type for reactor operations.
#[derive(Debug, Error)]
pub enum ReactorError {
    #[error("Reactor {name} has been destroyed; create a new reactor instead of reusing this one")]
    Destroyed { name: String },

    #[error("Invalid option {option}: {value} ({hint})")]
    InvalidOption {
        option: &'static str,
        value: String,
        hint: &'static str,
    },

    #[error("Invalid plugin: {0}")]
    InvalidPlugin(String),

    #[error("Plugin {plugin} failed to initialize: {message}")]
    PluginInit { plugin: String, message: String },

    #[error("Reactor changed from inside its own mutator or before-update hook")]
    ReentrantUpdate,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ReactorError {
    pub(crate) fn destroyed(name: Option<&str>) -> Self {
        ReactorError::Destroyed {
            name: name.unwrap_or("<unnamed>").to_string(),
        }
    }
}

impl From<serde_json::Error> for ReactorError {
    fn from(e: serde_json::Error) -> Self {
        ReactorError::Serialization(e.to_string())
    }
}

/// Result type for reactor operations.
pub type Result<T> = std::result::Result<T, ReactorError>;
