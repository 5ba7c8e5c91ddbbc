//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use fintrack_core::Credentials;

use crate::cli::Cli;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email address
    #[arg(long)]
    pub email: String,

    /// Account password
    #[arg(long, env = "FINTRACK_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(cli: &Cli, args: &LoginArgs) -> Result<()> {
    let client = session::open_client(cli)?;
    let credentials = Credentials::new(&args.email, &args.password);

    eprintln!("{}", "Logging in...".dimmed());

    client
        .login(&credentials)
        .await
        .context("Failed to login")?;

    output::success("Logged in successfully");
    output::field("Email", &args.email);
    output::field("API", client.config().base_url().as_str());

    Ok(())
}
