//! Error types for inventory_tracker

use std::time::Duration;
use thiserror::Error;

/// Unified error type for local inventory operations
#[derive(Debug, Error)]
pub enum InventoryError {
    /// No product with this SKU exists in the store
    #[error("Product not found: {0}")]
    NotFound(String),
    /// Caller supplied a value that violates a record invariant
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// A product with this SKU is already in the store
    #[error("Product already exists: {0}")]
    AlreadyExists(String),
    /// Caller's role does not allow the requested action
    #[error("User '{user}' is not allowed to {action}")]
    PermissionDenied { user: String, action: &'static str },
    /// A user with this name is already registered
    #[error("User already exists: {0}")]
    UserExists(String),
    /// No registered user has this name
    #[error("Unknown user: {0}")]
    UnknownUser(String),
    /// The user exists but has been deactivated
    #[error("User '{0}' is deactivated")]
    InactiveUser(String),
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A stored row could not be decoded back into a record
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    /// Export formatting failed
    #[error("Export error: {0}")]
    Export(String),
    /// A reconciliation pass aborted before applying anything
    #[error("Sync pass failed: {0}")]
    SyncFailed(String),
    /// Remote catalog call failed
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Failure modes of the remote catalog gateway
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Network/transport failure, timeout or server-side error
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
    /// Remote asked us to back off (HTTP 429)
    #[error("Catalog rate limited{}", fmt_retry_after(.retry_after))]
    RateLimited { retry_after: Option<Duration> },
    /// Remote validation refused the request; retrying as-is will not help
    #[error("Rejected by catalog: {0}")]
    Rejected(String),
    /// Response body could not be decoded
    #[error("Malformed catalog response: {0}")]
    Malformed(String),
}

fn fmt_retry_after(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

impl GatewayError {
    /// Whether the same request may succeed if retried later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Unavailable(_) | GatewayError::RateLimited { .. }
        )
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Malformed(err.to_string())
        } else {
            GatewayError::Unavailable(err.to_string())
        }
    }
}

/// Result alias for inventory_tracker operations
pub type Result<T> = std::result::Result<T, InventoryError>;
