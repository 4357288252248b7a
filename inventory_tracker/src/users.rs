//! Registered operators
//!
//! A caller is only as trusted as the registry says: the username must be
//! registered and active, and the stored role decides what it may do.
//! There are no passwords; whoever runs the binary names the user.

use crate::context::{CallerContext, Role};
use crate::error::{InventoryError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Account created on first start so a fresh database is usable
pub const DEFAULT_ADMIN: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// New active user; the name is trimmed and must not be empty
    pub fn new(username: &str, role: Role) -> Result<Self> {
        let username = username.trim();
        if username.is_empty() {
            return Err(InventoryError::InvalidInput(
                "Username must not be empty".to_string(),
            ));
        }
        Ok(Self {
            username: username.to_string(),
            role,
            is_active: true,
            created_at: Utc::now(),
        })
    }

    pub fn context(&self) -> CallerContext {
        CallerContext::new(self.username.clone(), self.role)
    }
}

/// Storage for registered users
pub trait UserDirectory: Send + Sync {
    /// Store a new user, `UserExists` if the name is taken
    fn insert_user(&self, user: User) -> Result<()>;

    /// `UnknownUser` if nobody is registered under this name
    fn get_user(&self, username: &str) -> Result<User>;

    /// All users ordered by name
    fn list_users(&self) -> Result<Vec<User>>;

    /// Flip the active flag and return the updated user
    fn set_user_active(&self, username: &str, active: bool) -> Result<User>;
}

/// Role-checked user management over a `UserDirectory`
pub struct UserRegistry {
    directory: Arc<dyn UserDirectory>,
}

impl UserRegistry {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Register `admin` as an administrator unless that name already exists
    pub fn ensure_default_admin(&self) -> Result<()> {
        match self.directory.get_user(DEFAULT_ADMIN) {
            Ok(_) => Ok(()),
            Err(InventoryError::UnknownUser(_)) => {
                self.directory
                    .insert_user(User::new(DEFAULT_ADMIN, Role::Admin)?)?;
                log::info!("Registered default admin user '{}'", DEFAULT_ADMIN);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Turn a username into a caller context, refusing unknown and deactivated users
    pub fn resolve(&self, username: &str) -> Result<CallerContext> {
        let user = self.directory.get_user(username.trim())?;
        if !user.is_active {
            log::warn!("Deactivated user '{}' refused", user.username);
            return Err(InventoryError::InactiveUser(user.username));
        }
        Ok(user.context())
    }

    pub fn register(&self, ctx: &CallerContext, username: &str, role: Role) -> Result<User> {
        ctx.require_modify("register users")?;
        let user = User::new(username, role)?;
        self.directory.insert_user(user.clone())?;
        log::info!(
            "{} registered user '{}' ({})",
            ctx.username,
            user.username,
            user.role
        );
        Ok(user)
    }

    pub fn get(&self, username: &str) -> Result<User> {
        self.directory.get_user(username.trim())
    }

    pub fn list(&self, ctx: &CallerContext) -> Result<Vec<User>> {
        ctx.require_modify("list users")?;
        self.directory.list_users()
    }

    /// Deactivated users keep their row but can no longer act
    pub fn deactivate(&self, ctx: &CallerContext, username: &str) -> Result<User> {
        ctx.require_modify("deactivate users")?;
        let username = username.trim();
        if username == ctx.username {
            return Err(InventoryError::InvalidInput(
                "Users cannot deactivate themselves".to_string(),
            ));
        }
        let user = self.directory.set_user_active(username, false)?;
        log::info!("{} deactivated user '{}'", ctx.username, user.username);
        Ok(user)
    }

    pub fn activate(&self, ctx: &CallerContext, username: &str) -> Result<User> {
        ctx.require_modify("activate users")?;
        let user = self.directory.set_user_active(username.trim(), true)?;
        log::info!("{} activated user '{}'", ctx.username, user.username);
        Ok(user)
    }
}
