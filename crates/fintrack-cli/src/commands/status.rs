//! Status command implementation.

use anyhow::{Context, Result};
use clap::Args;

use fintrack_core::TokenStore;

use crate::cli::Cli;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct StatusArgs {}

pub async fn run(cli: &Cli, _args: &StatusArgs) -> Result<()> {
    let store = session::open_store(cli)?;
    let pair = store.load().await.context("Failed to load session")?;

    output::field("Session file", &store.path().display().to_string());

    match pair {
        Some(pair) => {
            output::field("Status", "logged in");
            output::field(
                "Refresh token",
                if pair.refresh_token.is_some() {
                    "stored"
                } else {
                    "not stored"
                },
            );
        }
        None => output::field("Status", "not logged in"),
    }

    Ok(())
}
