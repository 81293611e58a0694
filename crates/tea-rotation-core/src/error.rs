//! Error types for the tea rotation domain.

use crate::ids::IdError;

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in domain operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The session has no participating (non-excused) orders.
    #[error("No orders found for this session.")]
    NoOrdersFound,

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// A user name was empty after trimming.
    #[error("user name must not be empty")]
    EmptyName,
}
