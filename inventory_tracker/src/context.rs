//! Caller identity passed explicitly into every facade call

use crate::error::{InventoryError, Result};
use std::fmt;
use std::str::FromStr;

/// Account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Full access: edits products and triggers catalog syncs
    Admin,
    /// Read-only access to stock and values
    Partner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Partner => "partner",
        }
    }

    pub fn can_modify(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "partner" => Ok(Role::Partner),
            other => Err(InventoryError::InvalidInput(format!(
                "Unknown role '{}', expected 'admin' or 'partner'",
                other
            ))),
        }
    }
}

/// Who is calling, as established by the authentication layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub username: String,
    pub role: Role,
}

impl CallerContext {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn admin(username: impl Into<String>) -> Self {
        Self::new(username, Role::Admin)
    }

    pub fn partner(username: impl Into<String>) -> Self {
        Self::new(username, Role::Partner)
    }

    /// Fail with `PermissionDenied` unless the caller may modify inventory
    pub fn require_modify(&self, action: &'static str) -> Result<()> {
        if self.role.can_modify() {
            Ok(())
        } else {
            log::warn!("{} ({}) denied: {}", self.username, self.role, action);
            Err(InventoryError::PermissionDenied {
                user: self.username.clone(),
                action,
            })
        }
    }
}
