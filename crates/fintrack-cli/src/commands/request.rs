//! Request command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio::sync::broadcast::Receiver;

use fintrack_core::{ApiRequest, Method};
use fintrack_http::SessionEvent;

use crate::cli::Cli;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    pub method: String,

    /// Path relative to the API URL, e.g. /wallets
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub body: Option<String>,
}

pub async fn run(cli: &Cli, args: &RequestArgs) -> Result<()> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", args.method))?;

    let mut request = ApiRequest::new(method, args.path.as_str());
    if let Some(body) = &args.body {
        let body: serde_json::Value =
            serde_json::from_str(body).context("Request body is not valid JSON")?;
        request = request.with_body(body);
    }

    let client = session::open_client(cli)?;
    let mut events = client.subscribe();

    let result = client.execute(request).await;
    report_session_events(&mut events);
    let response = result.context("Request failed")?;

    eprintln!("{}", response.status().to_string().dimmed());

    let body = response.body();
    if body.is_empty() {
        return Ok(());
    }
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => output::json_pretty(&value)?,
        Err(_) => println!("{}", String::from_utf8_lossy(body)),
    }

    Ok(())
}

fn report_session_events(events: &mut Receiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::Expired => output::warning("Session expired, refreshing"),
            SessionEvent::Refreshed => output::warning("Session refreshed"),
            SessionEvent::Ended => {
                output::error("Session ended. Run 'fintrack login' to sign in again.")
            }
        }
    }
}
