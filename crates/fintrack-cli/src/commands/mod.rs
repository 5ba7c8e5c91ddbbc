//! Subcommand implementations.

pub mod login;
pub mod logout;
pub mod refresh_token;
pub mod request;
pub mod status;

use anyhow::Result;

use crate::cli::{Cli, Commands};

pub async fn handle(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Login(args) => login::run(&cli, args).await,
        Commands::Logout(args) => logout::run(&cli, args).await,
        Commands::Status(args) => status::run(&cli, args).await,
        Commands::RefreshToken(args) => refresh_token::run(&cli, args).await,
        Commands::Request(args) => request::run(&cli, args).await,
    }
}
