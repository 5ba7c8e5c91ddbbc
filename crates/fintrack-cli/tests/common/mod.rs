use std::path::{Path, PathBuf};
use std::process::Output;

use tempfile::TempDir;
use tokio::process::Command;

/// An isolated session file for one test.
pub struct Sandbox {
    _dir: TempDir,
    session_file: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let session_file = dir.path().join("session.json");
        Self {
            _dir: dir,
            session_file,
        }
    }

    pub fn session_file(&self) -> &Path {
        &self.session_file
    }

    /// Write a session file directly, as a previous login would have.
    pub fn seed(&self, access: &str, refresh: Option<&str>) {
        let mut tokens = serde_json::json!({ "accessToken": access });
        if let Some(refresh) = refresh {
            tokens["refreshToken"] = refresh.into();
        }
        std::fs::write(&self.session_file, tokens.to_string()).unwrap();
    }

    /// The stored session file as JSON, or `None` if it does not exist.
    pub fn stored(&self) -> Option<serde_json::Value> {
        let contents = std::fs::read_to_string(&self.session_file).ok()?;
        Some(serde_json::from_str(&contents).unwrap())
    }

    /// Run the CLI binary against the given API URL.
    pub async fn run(&self, api_url: &str, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_fintrack"))
            .args(args)
            .arg("--api-url")
            .arg(api_url)
            .arg("--session-file")
            .arg(&self.session_file)
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("FINTRACK_API_URL")
            .env_remove("FINTRACK_SESSION_FILE")
            .output()
            .await
            .expect("Failed to execute CLI")
    }

    /// Run the CLI and expect success, returning stdout.
    pub async fn run_success(&self, api_url: &str, args: &[&str]) -> String {
        let output = self.run(api_url, args).await;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
        }
        String::from_utf8_lossy(&output.stdout).to_string()
    }
}
