//! Domain service for authentication and admin account management.
//!
//! Handles login, password changes, admin user administration, and first-run
//! provisioning of the default admin account.

use thiserror::Error;

use crate::db::User;
use crate::services::password_policy::PolicyViolation;

/// Username of the account provisioned on an empty user table.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Initial password of the provisioned account. It is created with the
/// must-change flag set, so it only ever works for the first login.
pub const DEFAULT_ADMIN_PASSWORD: &str = "ChangeMe123!";

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required field is missing or malformed. The message is shown to the
    /// user verbatim.
    #[error("{0}")]
    Validation(String),

    /// Login failed. One message regardless of whether the username exists.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Login succeeded but the account lacks the admin flag.
    #[error("Access denied. Admin privileges required.")]
    AdminRequired,

    /// An authenticated non-admin reached an admin-only operation.
    #[error("Access denied")]
    AccessDenied,

    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    #[error("User not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl AuthError {
    /// Whether this error is shown inline on the form that caused it, rather
    /// than mapped to an HTTP error status.
    #[must_use]
    pub const fn is_form_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidCredentials | Self::AdminRequired | Self::Policy(_)
        )
    }
}

/// Outcome of the first-run admin provisioning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The default admin account was created.
    Created,
    /// At least one admin already exists, or another writer won the race.
    AlreadyProvisioned,
    /// The user table is not queryable yet; nothing was written.
    StoreNotReady,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and returns the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for a bad username or
    /// password and [`AuthError::AdminRequired`] when the account is not an
    /// admin.
    async fn login(&self, username: &str, password: &str) -> Result<User, AuthError>;

    /// Changes the password of the authenticated user and clears the
    /// must-change flag.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] for a wrong current password or a
    /// confirmation mismatch, and [`AuthError::Policy`] when the new password
    /// fails the complexity rules.
    async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AuthError>;

    /// Lists all admin accounts, oldest first.
    async fn list_admin_users(&self, acting_user: &User) -> Result<Vec<User>, AuthError>;

    /// Creates a new admin account with the must-change flag set.
    async fn create_admin_user(
        &self,
        acting_user: &User,
        username: &str,
        password: &str,
    ) -> Result<User, AuthError>;

    /// Deletes another admin account and returns the deleted record.
    async fn delete_admin_user(
        &self,
        acting_user: &User,
        target_id: i32,
    ) -> Result<User, AuthError>;

    /// Sets a new password for another account and flags it for change at
    /// next login.
    async fn reset_admin_password(
        &self,
        acting_user: &User,
        target_id: i32,
        new_password: &str,
    ) -> Result<User, AuthError>;

    /// Creates the default admin account when no admin exists yet. Safe to
    /// call on every startup, including against a store whose schema has not
    /// been migrated.
    async fn bootstrap_default_admin(&self) -> Result<BootstrapOutcome, AuthError>;
}
