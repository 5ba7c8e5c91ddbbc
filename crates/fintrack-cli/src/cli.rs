//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{login, logout, refresh_token, request, status};

/// Command-line client for the fintrack personal finance API.
#[derive(Parser, Debug)]
#[command(name = "fintrack")]
#[command(author, version = env!("FINTRACK_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Base URL of the finance API
    #[arg(
        long,
        env = "FINTRACK_API_URL",
        default_value = "http://localhost:3000",
        global = true
    )]
    pub api_url: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "FINTRACK_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub timeout_secs: u64,

    /// Where the session tokens are stored (defaults to the platform data directory)
    #[arg(long, env = "FINTRACK_SESSION_FILE", global = true)]
    pub session_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the session tokens
    Login(login::LoginArgs),

    /// Forget the stored session
    Logout(logout::LogoutArgs),

    /// Show whether a session is stored
    Status(status::StatusArgs),

    /// Refresh the session now
    RefreshToken(refresh_token::RefreshTokenArgs),

    /// Send an authenticated request and print the response
    Request(request::RequestArgs),
}
