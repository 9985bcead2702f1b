//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these. Messages are user-facing.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Bad parameter combination or a state conflict (duplicate name, not subscribed, ...).
    #[error("{0}")]
    Invalid(String),

    /// The acting user lacks a permission.
    #[error("{0}")]
    Forbidden(String),

    /// Unknown (or hidden) stream, group or user.
    #[error("{0}")]
    NotFound(String),

    #[error("Repository error: {0}")]
    Repo(String),

    #[error("Notification error: {0}")]
    Notify(String),
}

impl DomainError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn insufficient_permission() -> Self {
        Self::Forbidden("Insufficient permission".to_string())
    }

    pub fn invalid_stream_id() -> Self {
        Self::NotFound("Invalid channel ID".to_string())
    }
}
