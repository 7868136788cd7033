pub mod password_policy;
pub use password_policy::{PolicyViolation, validate_password};

pub mod auth_service;
pub use auth_service::{AuthError, AuthService, BootstrapOutcome};

pub mod auth_service_impl;
pub use auth_service_impl::SeaOrmAuthService;
