//! Error taxonomy shared by the order pipeline.

use thiserror::Error;

/// Errors surfaced by generation, conditions, and the session coordinator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    /// A referenced restaurant, order, or player does not exist.
    #[error("{kind} named {name:?} doesn't exist")]
    NotFound { kind: &'static str, name: String },
    /// A stock condition was built without the section or item it targets.
    #[error("{condition} condition requires a {parameter}")]
    MissingParameter {
        condition: &'static str,
        parameter: &'static str,
    },
    /// Structural state the game relies on has been corrupted upstream.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    /// A collaborator (player store, notification channel) failed.
    #[error("{service} failed: {message}")]
    ExternalService {
        service: &'static str,
        message: String,
    },
}

impl GameError {
    pub(crate) fn restaurant_not_found(name: &str) -> Self {
        Self::NotFound {
            kind: "restaurant",
            name: name.to_string(),
        }
    }

    pub(crate) fn order_not_found(order_id: &str) -> Self {
        Self::NotFound {
            kind: "order",
            name: order_id.to_string(),
        }
    }

    pub(crate) fn player_store<E: std::error::Error>(err: &E) -> Self {
        Self::ExternalService {
            service: "player store",
            message: err.to_string(),
        }
    }

    /// Whether the caller can reasonably retry or re-prompt.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::ExternalService { .. })
    }
}
