//! Settings - TOML 設定ファイル
//!
//! ファイルが無ければ既定値。部分的に書かれたファイルは欠けた項目だけ既定値で埋める。
//!
//! ```toml
//! recordings_dir = "/home/me/recordings"
//! namespace = "Recordings/recsync"
//!
//! [remote]
//! kind = "drive"          # or "directory" with `directory = "/mnt/nas/rec"`
//! parent = "root"
//! timeout_secs = 60
//!
//! [retry]
//! base_delay_secs = 30
//! max_attempts = 5
//!
//! [credential]
//! command = "gcloud auth print-access-token"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::app::{DEFAULT_NAMESPACE, DEFAULT_PARENT};
use crate::host::RetryPolicy;
use crate::impls::drive::{DRIVE_API_BASE, DRIVE_UPLOAD_BASE};
use crate::domain::SyncError;
use crate::impls::{
    CommandCredentialProvider, DEFAULT_TOKEN_VAR, DirectoryRemoteStore, DriveClient, DriveConfig,
    EnvCredentialProvider,
};
use crate::ports::{CredentialProvider, RemoteStore};

const APP_DIR: &str = "recsync";

/// Upper bound for retry delays (7 days).
pub const MAX_DELAY_SECS: u64 = 7 * 24 * 60 * 60;

/// Upper bound for the HTTP connect/read timeout.
pub const MAX_TIMEOUT_SECS: u64 = 60 * 60;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the local catalog; recordings live under `<recordings_dir>/<namespace>`.
    pub recordings_dir: PathBuf,
    pub namespace: String,

    /// Where the chosen destination is persisted.
    pub state_file: PathBuf,

    pub remote: RemoteSettings,
    pub retry: RetrySettings,
    pub credential: CredentialSettings,
}

/// Which `RemoteStore` receives the recordings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    #[default]
    Drive,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub kind: RemoteKind,

    /// Root of the destination tree when `kind = "directory"`.
    pub directory: Option<PathBuf>,

    pub api_base: String,
    pub upload_base: String,
    /// Folder the destination folder is created under.
    pub parent: String,
    pub timeout_secs: u64,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub base_delay_secs: u64,
    pub multiplier: f64,
    pub max_delay_secs: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    pub env_var: String,
    /// Shell command printing a token. Takes precedence over `env_var`.
    pub command: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            recordings_dir: data_dir.join("recordings"),
            namespace: DEFAULT_NAMESPACE.to_string(),
            state_file: data_dir.join("state.json"),
            remote: RemoteSettings::default(),
            retry: RetrySettings::default(),
            credential: CredentialSettings::default(),
        }
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        let drive = DriveConfig::default();
        Self {
            kind: RemoteKind::Drive,
            directory: None,
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
            parent: DEFAULT_PARENT.to_string(),
            timeout_secs: drive.timeout.as_secs(),
            page_size: drive.page_size,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::standard();
        Self {
            base_delay_secs: policy.base_delay.as_secs(),
            multiplier: policy.multiplier,
            max_delay_secs: policy.max_delay.as_secs(),
            max_attempts: 5,
        }
    }
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            env_var: DEFAULT_TOKEN_VAR.to_string(),
            command: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Settings {
    /// `<config_dir>/recsync/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let settings: Self = toml::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.namespace.trim_matches('/').is_empty() {
            return Err(invalid("namespace", "must name a directory"));
        }
        if self.remote.parent.trim().is_empty() {
            return Err(invalid("remote.parent", "must not be blank"));
        }
        if self.remote.page_size == 0 {
            return Err(invalid("remote.page_size", "must be positive"));
        }
        if !(1..=MAX_TIMEOUT_SECS).contains(&self.remote.timeout_secs) {
            return Err(invalid(
                "remote.timeout_secs",
                &format!("must be between 1 and {MAX_TIMEOUT_SECS}"),
            ));
        }
        if self.remote.kind == RemoteKind::Directory && self.remote.directory.is_none() {
            return Err(invalid("remote.directory", "required when kind = \"directory\""));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(invalid("retry.multiplier", "must be a finite number >= 1"));
        }
        if self.retry.max_delay_secs > MAX_DELAY_SECS {
            return Err(invalid(
                "retry.max_delay_secs",
                &format!("must be at most {MAX_DELAY_SECS}"),
            ));
        }
        if self.retry.base_delay_secs > self.retry.max_delay_secs {
            return Err(invalid("retry.base_delay_secs", "must not exceed retry.max_delay_secs"));
        }
        Ok(())
    }

    pub fn drive_config(&self) -> DriveConfig {
        DriveConfig {
            api_base: self.remote.api_base.trim_end_matches('/').to_string(),
            upload_base: self.remote.upload_base.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(self.remote.timeout_secs),
            page_size: self.remote.page_size,
        }
    }

    /// Destination store selected by `remote.kind`.
    pub fn remote_store(&self) -> Result<Arc<dyn RemoteStore>, SyncError> {
        match (self.remote.kind, &self.remote.directory) {
            (RemoteKind::Drive, _) => Ok(Arc::new(DriveClient::new(self.drive_config())?)),
            (RemoteKind::Directory, Some(dir)) => Ok(Arc::new(DirectoryRemoteStore::new(dir))),
            (RemoteKind::Directory, None) => Err(SyncError::Configuration(
                "remote.directory is required when kind = \"directory\"".to_string(),
            )),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_secs(self.retry.base_delay_secs),
            multiplier: self.retry.multiplier,
            max_delay: Duration::from_secs(self.retry.max_delay_secs),
        }
    }

    pub fn credential_provider(&self) -> Arc<dyn CredentialProvider> {
        match &self.credential.command {
            Some(command) if !command.trim().is_empty() => {
                Arc::new(CommandCredentialProvider::new(command.clone()))
            }
            _ => Arc::new(EnvCredentialProvider::new(self.credential.env_var.clone())),
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> SettingsError {
    SettingsError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
