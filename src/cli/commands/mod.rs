mod admin;
mod init;
mod migrate;

pub use admin::{cmd_create_admin, cmd_list_admins, cmd_reset_password};
pub use init::cmd_init_config;
pub use migrate::cmd_migrate;
