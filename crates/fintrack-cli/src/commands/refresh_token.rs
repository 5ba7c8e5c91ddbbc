//! Refresh token command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::cli::Cli;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct RefreshTokenArgs {}

pub async fn run(cli: &Cli, _args: &RefreshTokenArgs) -> Result<()> {
    let client = session::open_client(cli)?;

    if !client.has_session().await.context("Failed to load session")? {
        anyhow::bail!("No active session. Run 'fintrack login' first.");
    }

    eprintln!("{}", "Refreshing session...".dimmed());

    client
        .refresh_session()
        .await
        .context("Failed to refresh session")?;

    output::success("Session refreshed successfully");
    Ok(())
}
