//! Admin account command handlers
//!
//! These talk to the store directly and skip the acting-admin checks the
//! HTTP layer enforces; whoever can run the binary already owns the data.

use crate::config::Config;
use crate::db::Store;
use crate::db::repositories::user::generate_temp_password;
use crate::services::validate_password;

pub async fn cmd_create_admin(
    config: &Config,
    username: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let username = username.trim();
    if username.is_empty() {
        anyhow::bail!("Username cannot be empty");
    }
    if username.chars().count() > 80 {
        anyhow::bail!("Username must be 80 characters or fewer");
    }

    let (password, generated) = match password {
        Some(password) => (password, false),
        None => (generate_temp_password(), true),
    };
    validate_password(&password, None)?;

    let store = Store::new(&config.general.database_path).await?;
    let user = store
        .create_user(username, &password, true, true, &config.security)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User '{username}' already exists"))?;

    println!("Admin user '{}' created (id {}).", user.username, user.id);
    if generated {
        println!("Temporary password: {password}");
    }
    println!("The password must be changed at first login.");

    Ok(())
}

pub async fn cmd_reset_password(config: &Config, username: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let user = store
        .get_user_by_username(username)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User '{username}' not found"))?;

    let password = generate_temp_password();
    store
        .set_user_password(user.id, &password, true, &config.security)
        .await?;

    println!("Password reset for '{}'.", user.username);
    println!("Temporary password: {password}");
    println!("It must be changed at next login.");

    Ok(())
}

pub async fn cmd_list_admins(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let admins = store.list_admins().await?;

    if admins.is_empty() {
        println!("No admin accounts found.");
        println!();
        println!("Create one with: wayfinder create-admin <username>");
        return Ok(());
    }

    println!("Admin Accounts ({} total)", admins.len());
    println!("{:-<70}", "");

    for user in admins {
        let flag = if user.password_must_change {
            " [must change password]"
        } else {
            ""
        };
        println!("{} {}{}", user.id, user.username, flag);
        println!("  Created: {}", user.created_at);
    }

    Ok(())
}
