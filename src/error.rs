//! Error types for registry resolution and checking

use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registry errors
///
/// Data problems inside a schema (undefined names, missing groups,
/// redefinitions) are logged and never surface here. These variants are
/// caller mistakes or structurally broken input.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("No {attribute} requested, but '{attribute}' attribute is present with value '{value}'")]
    UnrequestedAttribute {
        attribute: &'static str,
        value: String,
    },

    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid enumerant {name}: {reason}")]
    InvalidEnumerant { name: String, reason: String },

    #[error("Handle parent cycle detected: {handle} depends on itself via {}", chain.join(" -> "))]
    HandleCycle { handle: String, chain: Vec<String> },

    #[error("Return code mentioned in check configuration is not defined by the registry: {0}")]
    UnknownReturnCode(String),

    #[error("Resolution phase violation: cannot {operation} while in phase {phase}")]
    PhaseViolation {
        operation: &'static str,
        phase: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
