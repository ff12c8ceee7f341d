//! Error types for ornate_core
//!
//! Errors fall into four groups:
//!
//! - **Configuration errors** are raised while a class is being declared
//!   (decorator misuse, malformed transformer options) or when its first
//!   instance is constructed (invalid declared defaults).
//! - **Validation errors** are raised by setters when a value falls outside
//!   a transformer's domain. A rejected write never takes effect.
//! - **Internals misuse** is raised when the low-level internals handle is
//!   requested twice.
//! - Malformed external attribute strings never produce an error; the
//!   transformer keeps its previous or default value instead.

use thiserror::Error;

/// Errors that can occur while declaring classes or driving instances
#[derive(Error, Debug)]
pub enum OrnateError {
    /// A decorator was applied to a member it does not support, or was
    /// given malformed options
    #[error("invalid declaration for `{member}`: {reason}")]
    Config { member: String, reason: String },

    /// A setter rejected a value
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The element internals were already attached for this instance
    #[error("element internals are already attached")]
    InternalsAttached,

    /// Dynamic access to a property the class does not manage
    #[error("`{key}` is not a managed property of `{class}`")]
    UnknownProperty { key: String, class: String },

    /// Dynamic access with the wrong value type
    #[error("type mismatch for `{key}`: expected {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// No class is defined under a tag name
    #[error("no class is defined for tag `{0}`")]
    UnknownTag(String),

    /// Failed to read or parse a configuration file
    #[error("configuration error: {0}")]
    ConfigFile(String),
}

impl OrnateError {
    /// Shorthand for a configuration error on a named member
    pub fn config(member: impl Into<String>, reason: impl Into<String>) -> Self {
        OrnateError::Config {
            member: member.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised at declaration or first-construction time
    pub fn is_config(&self) -> bool {
        matches!(self, OrnateError::Config { .. })
    }
}

/// A value was rejected by a transformer's `validate`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The value has the wrong shape (NaN, not serializable, not a handler slot)
    #[error("type error: {0}")]
    Type(String),

    /// The value is outside the accepted range or set
    #[error("range error: {0}")]
    Range(String),
}

/// Result type for ornate_core operations
pub type Result<T> = std::result::Result<T, OrnateError>;
