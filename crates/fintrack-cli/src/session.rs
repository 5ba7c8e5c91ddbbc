//! Session file location and client construction.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use fintrack_core::ApiUrl;
use fintrack_file::FileTokenStore;
use fintrack_http::{ApiClient, ClientConfig};

use crate::cli::Cli;

/// Resolve the session file, falling back to the platform data directory.
pub fn session_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(path) = &cli.session_file {
        return Ok(path.clone());
    }

    let dirs =
        ProjectDirs::from("", "", "fintrack").context("Could not determine data directory")?;

    let data_dir = dirs.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data directory")?;

    Ok(data_dir.join("session.json"))
}

/// Open the token store for this invocation.
pub fn open_store(cli: &Cli) -> Result<FileTokenStore> {
    Ok(FileTokenStore::new(session_path(cli)?))
}

/// Build a client backed by the session file.
pub fn open_client(cli: &Cli) -> Result<ApiClient> {
    let base_url = ApiUrl::new(&cli.api_url).context("Invalid API URL")?;
    let config = ClientConfig::new(base_url)
        .with_request_timeout(Duration::from_secs(cli.timeout_secs))
        .with_user_agent(format!("fintrack-cli/{}", env!("FINTRACK_VERSION")));

    let store = open_store(cli)?;
    tracing::debug!(path = %store.path().display(), "using session file");

    ApiClient::new(config, Arc::new(store)).context("Failed to create API client")
}
