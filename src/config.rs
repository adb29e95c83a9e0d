//! Configuration loading and persistence.
//!
//! Handles reading and writing the livefeed configuration file. The session
//! cookie is a credential and is kept out of `config.json`; it lives in its
//! own owner-only file next to it (or comes from `LIVEFEED_SESSION_COOKIE`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use std::{fs, path::Path, path::PathBuf};

use crate::constants::{DEFAULT_FETCH_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};

/// File holding the session cookie, relative to the config directory.
const SESSION_COOKIE_FILE: &str = "session_cookie";

/// Configuration for the livefeed client.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    /// Base URL of the backend (`https://host[:port]`).
    pub backend_url: String,
    /// Session cookie (`name=value`) - NOT serialized to `config.json`.
    #[serde(skip)]
    pub session_cookie: String,
    /// Timeout in seconds for the status probe and trigger requests.
    pub request_timeout_secs: u64,
    /// Seconds `livefeed fetch` waits for the channel and first payload.
    pub fetch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000".to_string(),
            session_cookie: String::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `#[cfg(test)]` (unit tests): `tmp/livefeed-test`
    /// 2. `LIVEFEED_CONFIG_DIR` env var: explicit override
    /// 3. `LIVEFEED_ENV=test`: `tmp/livefeed-test` (integration tests)
    /// 4. Default: platform config dir (Linux: ~/.config/livefeed)
    pub fn config_dir() -> Result<PathBuf> {
        let dir = {
            #[cfg(test)]
            {
                PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/livefeed-test")
            }

            #[cfg(not(test))]
            {
                if let Ok(dir) = std::env::var("LIVEFEED_CONFIG_DIR") {
                    PathBuf::from(dir)
                } else if crate::env::is_test_mode() {
                    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/livefeed-test")
                } else {
                    dirs::config_dir()
                        .context("Could not determine config directory")?
                        .join("livefeed")
                }
            }
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config dir {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from the config directory, with environment
    /// variable overrides applied on top.
    pub fn load() -> Result<Self> {
        let dir = Self::config_dir()?;
        let mut config = Self::load_from_dir(&dir);
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads `config.json` and the session cookie file from `dir`, falling
    /// back to defaults for anything missing or unreadable.
    pub fn load_from_dir(dir: &Path) -> Self {
        let mut config = match Self::read_config_file(&dir.join("config.json")) {
            Ok(config) => config,
            Err(e) => {
                log::debug!("[Config] Using defaults: {:#}", e);
                Self::default()
            }
        };

        if let Ok(cookie) = fs::read_to_string(dir.join(SESSION_COOKIE_FILE)) {
            config.session_cookie = cookie.trim().to_string();
        }

        config
    }

    fn read_config_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Config file not found");
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(backend_url) = std::env::var("LIVEFEED_BACKEND_URL") {
            self.backend_url = backend_url;
        }

        // Cookie from env var (for CI/CD and scripted use)
        if let Ok(cookie) = std::env::var("LIVEFEED_SESSION_COOKIE") {
            self.session_cookie = cookie;
        }

        if let Ok(timeout) = std::env::var("LIVEFEED_REQUEST_TIMEOUT") {
            if let Ok(secs) = timeout.parse::<u64>() {
                self.request_timeout_secs = secs;
            }
        }

        if let Ok(timeout) = std::env::var("LIVEFEED_FETCH_TIMEOUT") {
            if let Ok(secs) = timeout.parse::<u64>() {
                self.fetch_timeout_secs = secs;
            }
        }
    }

    /// Persists the current configuration to `dir`.
    /// Note: the session cookie is NOT saved here (use `save_session_cookie`).
    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        let config_path = dir.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        restrict_permissions(&config_path)
    }

    /// Persists the current configuration to the default config directory.
    pub fn save(&self) -> Result<()> {
        self.save_to_dir(&Self::config_dir()?)
    }

    /// HTTP request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Fetch wait limit as a `Duration`.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Whether a session cookie is configured at all.
    pub fn has_session_cookie(&self) -> bool {
        self.session_cookie.contains('=')
    }

    /// Store a session cookie next to the config file (owner-only).
    pub fn save_session_cookie(&mut self, dir: &Path, cookie: &str) -> Result<()> {
        self.session_cookie = cookie.trim().to_string();
        let path = dir.join(SESSION_COOKIE_FILE);
        fs::write(&path, &self.session_cookie)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        restrict_permissions(&path)
    }

    /// Forget the stored session cookie.
    pub fn clear_session_cookie(&mut self, dir: &Path) -> Result<()> {
        self.session_cookie.clear();
        let path = dir.join(SESSION_COOKIE_FILE);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

/// Set restrictive permissions (owner read/write only).
fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to chmod {}", path.display()))?;
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
