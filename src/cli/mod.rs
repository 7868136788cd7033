//! Command-line interface definitions

pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wayfinder")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default when no command is given)
    Serve,

    /// Create a default config file in the current directory
    #[command(alias = "--init")]
    Init,

    /// Apply pending database migrations and exit
    Migrate,

    /// Create an admin account
    CreateAdmin {
        /// Username for the new account
        username: String,

        /// Password for the new account. A temporary password is generated
        /// and printed when omitted.
        #[arg(long)]
        password: Option<String>,
    },

    /// Reset an account's password to a generated temporary one
    ResetPassword {
        /// Username of the account to reset
        username: String,
    },

    /// List all admin accounts
    ListAdmins,
}
