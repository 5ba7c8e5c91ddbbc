//! JSON-file token storage.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use fintrack_core::error::StorageError;
use fintrack_core::{AccessToken, RefreshToken, Result, TokenPair, TokenStore};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// On-disk layout. Each token lives under its own key.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl StoredTokens {
    fn into_pair(self) -> Option<TokenPair> {
        let access = self.access_token.filter(|t| !t.is_empty())?;
        let refresh = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .map(RefreshToken::new);
        Some(TokenPair::new(AccessToken::new(access), refresh))
    }
}

/// A [`TokenStore`] that persists the session to a JSON file.
///
/// The file is rewritten atomically and, on Unix, is readable only by the
/// owner. An advisory lock on a sibling `.lock` file serializes access
/// between processes sharing the same session, so a refresh in one process
/// never interleaves with a logout in another.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store backed by the file at `path`.
    ///
    /// Nothing is created on disk until the store is first used.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the session file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    fn io_error(&self, err: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            message: err.to_string(),
        }
    }

    /// Open and lock the lock file. The lock is released when the file drops.
    fn lock(&self, exclusive: bool) -> Result<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| self.io_error(e))?;

        let locked = if exclusive {
            lock_file.lock_exclusive()
        } else {
            lock_file.lock_shared()
        };
        locked.map_err(|e| self.io_error(e))?;

        Ok(lock_file)
    }

    fn read(&self) -> Result<StoredTokens> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StoredTokens::default()),
            Err(e) => return Err(self.io_error(e).into()),
        };

        if contents.trim().is_empty() {
            return Ok(StoredTokens::default());
        }

        serde_json::from_str(&contents).map_err(|e| {
            StorageError::Corrupt {
                path: self.path.clone(),
                message: e.to_string(),
            }
            .into()
        })
    }

    fn write(&self, tokens: &StoredTokens) -> Result<()> {
        let json = serde_json::to_string_pretty(tokens)?;
        let tmp_path = sibling(&self.path, "tmp");

        let mut file = File::create(&tmp_path).map_err(|e| self.io_error(e))?;

        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| self.io_error(e))?;

        file.write_all(json.as_bytes())
            .map_err(|e| self.io_error(e))?;
        file.sync_data().map_err(|e| self.io_error(e))?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(e))?;
        trace!(path = %self.path.display(), "token file written");
        Ok(())
    }
}

/// `session.json` -> `session.json.<ext>`
fn sibling(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(ext);
    path.with_file_name(name)
}

#[async_trait]
impl TokenStore for FileTokenStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<TokenPair>> {
        let _lock = self.lock(false)?;
        Ok(self.read()?.into_pair())
    }

    #[instrument(skip(self, pair), fields(path = %self.path.display()))]
    async fn save(&self, pair: &TokenPair) -> Result<()> {
        let _lock = self.lock(true)?;
        self.write(&StoredTokens {
            access_token: Some(pair.access_token.as_str().to_string()),
            refresh_token: pair.refresh_token.as_ref().map(|t| t.as_str().to_string()),
        })?;
        debug!("session saved");
        Ok(())
    }

    #[instrument(skip(self, token), fields(path = %self.path.display()))]
    async fn set_access_token(&self, token: &AccessToken) -> Result<bool> {
        let _lock = self.lock(true)?;
        let mut stored = self.read()?;
        if stored.access_token.as_deref().is_none_or(str::is_empty) {
            debug!("no session stored, access token discarded");
            return Ok(false);
        }
        stored.access_token = Some(token.as_str().to_string());
        self.write(&stored)?;
        debug!("access token replaced");
        Ok(true)
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn clear(&self) -> Result<()> {
        let _lock = self.lock(true)?;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("session cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e).into()),
        }
    }
}
