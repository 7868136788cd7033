use wayfinder::config::SecurityConfig;
use wayfinder::db::Store;
use wayfinder::services::{AuthService, BootstrapOutcome, SeaOrmAuthService};

#[tokio::test]
async fn test_bootstrap_creates_exactly_one_admin() {
    let store = Store::new("sqlite::memory:").await.unwrap();
    let service = SeaOrmAuthService::new(store.clone(), SecurityConfig::default());

    let first = service.bootstrap_default_admin().await.unwrap();
    assert_eq!(first, BootstrapOutcome::Created);

    let second = service.bootstrap_default_admin().await.unwrap();
    assert_eq!(second, BootstrapOutcome::AlreadyProvisioned);

    assert_eq!(store.count_admins().await.unwrap(), 1);
}

#[tokio::test]
async fn test_bootstrap_skips_when_any_admin_exists() {
    let store = Store::new("sqlite::memory:").await.unwrap();
    store
        .create_user("root", "R00t!Passw0rd", true, false, &SecurityConfig::default())
        .await
        .unwrap()
        .unwrap();

    let service = SeaOrmAuthService::new(store.clone(), SecurityConfig::default());
    let outcome = service.bootstrap_default_admin().await.unwrap();
    assert_eq!(outcome, BootstrapOutcome::AlreadyProvisioned);

    assert!(
        store
            .get_user_by_username("admin")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_bootstrap_without_schema_is_noop() {
    // connect() skips migrations, so the users table does not exist yet.
    let store = Store::connect("sqlite::memory:", 5, 1).await.unwrap();
    let service = SeaOrmAuthService::new(store, SecurityConfig::default());

    let outcome = service.bootstrap_default_admin().await.unwrap();
    assert_eq!(outcome, BootstrapOutcome::StoreNotReady);
}

#[tokio::test]
async fn test_default_admin_logs_in_with_forced_change() {
    let store = Store::new("sqlite::memory:").await.unwrap();
    let service = SeaOrmAuthService::new(store, SecurityConfig::default());
    service.bootstrap_default_admin().await.unwrap();

    let user = service.login("admin", "ChangeMe123!").await.unwrap();
    assert!(user.is_admin);
    assert!(user.password_must_change);
}
