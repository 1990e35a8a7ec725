//! Domain error taxonomy.

use crate::types::DbId;

/// Domain-level errors raised by core logic and surfaced by the API layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An entity lookup by ID found nothing.
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Entity type name, e.g. `"Device"`.
        entity: &'static str,
        id: DbId,
    },

    /// Input failed domain validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}
