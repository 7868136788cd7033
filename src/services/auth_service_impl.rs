//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::SecurityConfig;
use crate::db::{Store, User};
use crate::services::auth_service::{
    AuthError, AuthService, BootstrapOutcome, DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME,
};
use crate::services::password_policy;

/// Matches the width of the username column.
const MAX_USERNAME_LENGTH: usize = 80;

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self { store, security }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        // Verification time is uniform whether or not the username exists.
        let Some(user) = self.store.verify_login(username, password).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !user.is_admin {
            return Err(AuthError::AdminRequired);
        }

        info!(username = %user.username, "Login succeeded");
        Ok(user)
    }

    async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AuthError> {
        if current_password.is_empty() || new_password.is_empty() || confirm_password.is_empty() {
            return Err(AuthError::Validation("All fields are required".to_string()));
        }

        let current_ok = self
            .store
            .verify_user_password(user.id, current_password)
            .await?;
        if !current_ok {
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        if new_password != confirm_password {
            return Err(AuthError::Validation(
                "New passwords do not match".to_string(),
            ));
        }

        password_policy::validate_password(new_password, Some(current_password))?;

        // Clearing the must-change flag is what unlocks the rest of the app
        // after a forced change.
        self.store
            .set_user_password(user.id, new_password, false, &self.security)
            .await?;

        info!(username = %user.username, "Password changed");
        Ok(())
    }

    async fn list_admin_users(&self, acting_user: &User) -> Result<Vec<User>, AuthError> {
        if !acting_user.is_admin {
            return Err(AuthError::AccessDenied);
        }

        Ok(self.store.list_admins().await?)
    }

    async fn create_admin_user(
        &self,
        acting_user: &User,
        username: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        if !acting_user.is_admin {
            return Err(AuthError::AccessDenied);
        }

        if username.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        if username.chars().count() > MAX_USERNAME_LENGTH {
            return Err(AuthError::Validation(format!(
                "Username must be {MAX_USERNAME_LENGTH} characters or fewer"
            )));
        }

        password_policy::validate_password(password, None)?;

        // The unique constraint decides duplicates, not a prior read.
        let created = self
            .store
            .create_user(username, password, true, true, &self.security)
            .await?;

        let Some(user) = created else {
            return Err(AuthError::Validation(format!(
                "User '{username}' already exists"
            )));
        };

        info!(
            username = %user.username,
            created_by = %acting_user.username,
            "Admin user created"
        );
        Ok(user)
    }

    async fn delete_admin_user(
        &self,
        acting_user: &User,
        target_id: i32,
    ) -> Result<User, AuthError> {
        if !acting_user.is_admin {
            return Err(AuthError::AccessDenied);
        }

        if target_id == acting_user.id {
            return Err(AuthError::Validation("You cannot delete yourself".to_string()));
        }

        let user = self
            .store
            .get_user_by_id(target_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        self.store.delete_user(user.id).await?;

        info!(
            username = %user.username,
            deleted_by = %acting_user.username,
            "Admin user deleted"
        );
        Ok(user)
    }

    async fn reset_admin_password(
        &self,
        acting_user: &User,
        target_id: i32,
        new_password: &str,
    ) -> Result<User, AuthError> {
        if !acting_user.is_admin {
            return Err(AuthError::AccessDenied);
        }

        if new_password.is_empty() {
            return Err(AuthError::Validation("New password is required".to_string()));
        }

        let user = self
            .store
            .get_user_by_id(target_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        password_policy::validate_password(new_password, None)?;

        self.store
            .set_user_password(user.id, new_password, true, &self.security)
            .await?;

        info!(
            username = %user.username,
            reset_by = %acting_user.username,
            "Password reset, change required at next login"
        );
        Ok(User {
            password_must_change: true,
            ..user
        })
    }

    async fn bootstrap_default_admin(&self) -> Result<BootstrapOutcome, AuthError> {
        let admin_count = match self.store.count_admins().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Skipping default admin bootstrap, user table not ready: {e:#}");
                return Ok(BootstrapOutcome::StoreNotReady);
            }
        };

        if admin_count > 0 {
            return Ok(BootstrapOutcome::AlreadyProvisioned);
        }

        let created = self
            .store
            .create_user(
                DEFAULT_ADMIN_USERNAME,
                DEFAULT_ADMIN_PASSWORD,
                true,
                true,
                &self.security,
            )
            .await?;

        if created.is_none() {
            // A concurrent writer, or a non-admin row already holding the
            // default username.
            return Ok(BootstrapOutcome::AlreadyProvisioned);
        }

        info!(
            username = DEFAULT_ADMIN_USERNAME,
            "Default admin account created, password change required at first login"
        );
        Ok(BootstrapOutcome::Created)
    }
}
