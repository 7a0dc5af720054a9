//! Configuration for gclean
//!
//! OAuth credentials are loaded from (in order of priority):
//! 1. Compile-time embedded credentials (for release builds)
//! 2. JSON file (Google Cloud Console format)
//! 3. Runtime environment variables (fallback)
//!
//! Tunables live in `settings.json`; every field is optional.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::actions::DEFAULT_BATCH_SIZE;
use crate::remote::MAX_DELETE_BATCH;
use crate::sync::MAX_PAGE_SIZE;

/// Credentials filename in the gclean config directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// Settings filename in the gclean config directory
const SETTINGS_FILE: &str = "settings.json";

/// Default store filename in the gclean config directory
const STORE_FILE: &str = "gclean.sqlite";

/// Store path used when no config directory exists
const FALLBACK_STORE_PATH: &str = "gclean.db";

/// Environment variable overriding the store location
pub const STORE_ENV_VAR: &str = "GCLEAN_DB";

/// OAuth credentials for Gmail API access
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file format
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Load credentials using the following priority:
    /// 1. Compile-time embedded credentials
    /// 2. JSON file (~/.config/gclean/credentials.json)
    /// 3. Runtime environment variables
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(creds);
        }

        Self::from_env().with_context(|| {
            let path = Self::default_credentials_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| CREDENTIALS_FILE.to_string());
            format!("No Gmail credentials found; download an OAuth client JSON to {path}")
        })
    }

    /// Load credentials embedded at compile time via environment variables.
    /// Build with: GOOGLE_CLIENT_ID=xxx GOOGLE_CLIENT_SECRET=yyy cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let client_id = option_env!("GOOGLE_CLIENT_ID")?;
        let client_secret = option_env!("GOOGLE_CLIENT_SECRET")?;

        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(Self::new(client_id, client_secret))
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        let installed = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self::new(installed.client_id, installed.client_secret))
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GMAIL_CLIENT_ID")
            .context("GMAIL_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET")
            .context("GMAIL_CLIENT_SECRET environment variable not set")?;

        Ok(Self::new(client_id, client_secret))
    }

    /// Get the default credentials file path (~/.config/gclean/credentials.json)
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}

/// User settings from `settings.json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Location of the SQLite store
    pub store_path: Option<PathBuf>,
    /// Ids requested per list call
    pub page_size: Option<usize>,
    /// Ids per remote delete call
    pub batch_size: Option<usize>,
}

impl Settings {
    /// Load settings, or defaults when the file does not exist
    pub fn load() -> Result<Self> {
        if config::config_exists(SETTINGS_FILE) {
            config::load_json(SETTINGS_FILE)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// List page size, clamped to 1..=500
    pub fn page_size(&self) -> usize {
        self.page_size.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Delete batch size, clamped to 1..=100
    pub fn batch_size(&self) -> usize {
        self.batch_size
            .unwrap_or(DEFAULT_BATCH_SIZE)
            .clamp(1, MAX_DELETE_BATCH)
    }

    /// Resolve the store location
    ///
    /// Priority: explicit flag, `GCLEAN_DB`, `store_path` setting, the
    /// config directory, then `./gclean.db`.
    pub fn resolve_store_path(&self, flag: Option<&Path>) -> PathBuf {
        let env = std::env::var_os(STORE_ENV_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        self.resolve_store_path_with(flag, env, config::config_path(STORE_FILE))
    }

    fn resolve_store_path_with(
        &self,
        flag: Option<&Path>,
        env: Option<PathBuf>,
        config_default: Option<PathBuf>,
    ) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or(env)
            .or_else(|| self.store_path.clone())
            .or(config_default)
            .unwrap_or_else(|| PathBuf::from(FALLBACK_STORE_PATH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_installed_credentials() {
        let json = r#"{
            "installed": {
                "client_id": "test-client-id.apps.googleusercontent.com",
                "client_secret": "test-secret",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token"
            }
        }"#;

        let creds = GmailCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "test-client-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "test-secret");
    }

    #[test]
    fn test_parse_web_credentials() {
        let json = r#"{
            "web": {
                "client_id": "web-client-id.apps.googleusercontent.com",
                "client_secret": "web-secret"
            }
        }"#;

        let creds = GmailCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "web-client-id.apps.googleusercontent.com");
    }

    #[test]
    fn test_invalid_json() {
        let json = r#"{ "other": {} }"#;
        assert!(GmailCredentials::from_json(json).is_err());
    }

    #[test]
    fn test_settings_defaults_and_clamping() {
        let settings = Settings::default();
        assert_eq!(settings.page_size(), 500);
        assert_eq!(settings.batch_size(), 100);

        let settings: Settings =
            serde_json::from_str(r#"{ "page_size": 5000, "batch_size": 0 }"#).unwrap();
        assert_eq!(settings.page_size(), 500);
        assert_eq!(settings.batch_size(), 1);

        let settings: Settings = serde_json::from_str(r#"{ "batch_size": 25 }"#).unwrap();
        assert_eq!(settings.batch_size(), 25);
    }

    #[test]
    fn test_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "store_path": "/data/mail.sqlite" }"#).unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.store_path, Some(PathBuf::from("/data/mail.sqlite")));
        assert_eq!(settings.page_size(), 500);
    }

    #[test]
    fn test_store_path_priority() {
        let settings = Settings {
            store_path: Some(PathBuf::from("settings.sqlite")),
            ..Default::default()
        };
        let config_default = Some(PathBuf::from("config.sqlite"));

        let path = settings.resolve_store_path_with(
            Some(Path::new("flag.sqlite")),
            Some(PathBuf::from("env.sqlite")),
            config_default.clone(),
        );
        assert_eq!(path, PathBuf::from("flag.sqlite"));

        let path = settings.resolve_store_path_with(
            None,
            Some(PathBuf::from("env.sqlite")),
            config_default.clone(),
        );
        assert_eq!(path, PathBuf::from("env.sqlite"));

        let path = settings.resolve_store_path_with(None, None, config_default.clone());
        assert_eq!(path, PathBuf::from("settings.sqlite"));

        let path = Settings::default().resolve_store_path_with(None, None, config_default);
        assert_eq!(path, PathBuf::from("config.sqlite"));

        let path = Settings::default().resolve_store_path_with(None, None, None);
        assert_eq!(path, PathBuf::from("gclean.db"));
    }
}
