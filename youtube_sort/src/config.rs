//! OAuth client credentials and the directory they live in.
//!
//! The directory is `$SORTYT_CONFIG_DIR` when set, otherwise `sortyt` under
//! the platform config directory (`~/.config/sortyt` on Linux).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SortError};

pub const APP_DIR_NAME: &str = "sortyt";
pub const CONFIG_DIR_ENV: &str = "SORTYT_CONFIG_DIR";
pub const CREDENTIALS_FILE: &str = "credentials.json";
pub const DEFAULT_REDIRECT_URL: &str = "http://localhost:8080/callback";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,
}

fn default_redirect_url() -> String {
    DEFAULT_REDIRECT_URL.to_string()
}

impl Config {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Config {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: default_redirect_url(),
        }
    }

    /// Loads `credentials.json` from `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = dir.join(CREDENTIALS_FILE);
        let data = fs::read_to_string(&path).map_err(|e| {
            SortError::Config(format!(
                "cannot read {} ({e}); run `sortyt setup` first",
                path.display()
            ))
        })?;
        let config: Config = serde_json::from_str(&data)
            .map_err(|e| SortError::Config(format!("invalid {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load() -> Result<Self> {
        Config::load_from(&config_dir()?)
    }

    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        self.validate()?;
        let path = dir.join(CREDENTIALS_FILE);
        write_private(&path, &serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    pub fn save(&self) -> Result<PathBuf> {
        self.save_to(&config_dir()?)
    }

    fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(SortError::Config("client_id is empty".into()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(SortError::Config("client_secret is empty".into()));
        }
        Ok(())
    }
}

/// Resolves the application directory without creating it.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| SortError::Config("could not determine config directory".into()))
}

/// Writes `contents` to `path`, creating parent directories. On unix the
/// directory ends up 0700 and the file 0600, even when either already existed.
pub(crate) fn write_private(path: &Path, contents: &str) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};

        if let Some(parent) = parent {
            fs::DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(parent)?;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file.write_all(contents.as_bytes())?;
    }

    #[cfg(not(unix))]
    {
        if let Some(parent) = parent {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
    }

    Ok(())
}
