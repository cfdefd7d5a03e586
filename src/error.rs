//! Error types for the profile engine.

use crate::types::{ItemId, Revision};
use thiserror::Error;

/// Main error type for profile operations.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown profile id: {0}")]
    UnknownProfileId(String),

    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Negative quantity {quantity} for item {item_id}")]
    NegativeQuantity { item_id: ItemId, quantity: i64 },

    #[error("Revision conflict: client acknowledged {client}, profile is at {current}")]
    RevisionConflict { client: i64, current: Revision },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corrupt profile document: {0}")]
    Corruption(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),
}

impl From<serde_json::Error> for ProfileError {
    fn from(e: serde_json::Error) -> Self {
        ProfileError::Serialization(e.to_string())
    }
}

/// Result type for profile operations.
pub type Result<T> = std::result::Result<T, ProfileError>;
