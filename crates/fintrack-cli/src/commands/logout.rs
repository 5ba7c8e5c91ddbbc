//! Logout command implementation.

use anyhow::{Context, Result};
use clap::Args;

use fintrack_core::TokenStore;

use crate::cli::Cli;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(cli: &Cli, _args: &LogoutArgs) -> Result<()> {
    let store = session::open_store(cli)?;

    store.clear().await.context("Failed to clear session")?;

    output::success("Logged out");
    Ok(())
}
