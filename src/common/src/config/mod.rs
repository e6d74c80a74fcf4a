use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "logrotator.toml";

/// Prefix for environment overrides, e.g. `LOGROTATOR__ROTATION__ARCHIVE=true`.
pub const ENV_PREFIX: &str = "LOGROTATOR__";

/// Remote object storage used by the upload stage.
///
/// Upload only happens when a bucket and both credentials are present. Leaving
/// any of them out is a valid deployment and silently disables the stage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Env: LOGROTATOR__ROTATION__STORAGE__BUCKET
    #[serde(default)]
    pub bucket: Option<String>,
    /// Env: LOGROTATOR__ROTATION__STORAGE__ACCESS_KEY_ID
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Env: LOGROTATOR__ROTATION__STORAGE__SECRET_ACCESS_KEY
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible targets such as MinIO.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Optional key prefix prepended to every uploaded object.
    #[serde(default)]
    pub key_prefix: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            access_key_id: None,
            secret_access_key: None,
            region: default_region(),
            endpoint: None,
            key_prefix: None,
        }
    }
}

impl StorageConfig {
    /// Bucket name, if one is set and non-empty.
    pub fn bucket(&self) -> Option<&str> {
        non_empty(&self.bucket)
    }

    /// Returns true when a bucket and a full credential pair are present.
    pub fn is_configured(&self) -> bool {
        self.bucket().is_some()
            && non_empty(&self.access_key_id).is_some()
            && non_empty(&self.secret_access_key).is_some()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Settings for the per-cycle database connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Upper bound on server selection before a cycle fails with a connection error.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Application name reported to the server.
    pub app_name: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            app_name: "logrotator".to_string(),
        }
    }
}

/// What a rotation cycle does.
///
/// The rotator snapshots this at the start of every cycle, so changes made
/// while a cycle is running only apply to the next one.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct RotationConfig {
    /// Connection string for the target server. Required.
    ///
    /// Env: LOGROTATOR__ROTATION__CONNECTION_URI
    #[serde(default)]
    pub connection_uri: String,

    /// Path of the server's live log file. Without it the rotator only issues
    /// the rotate command and does not track files on disk.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Start the schedule as soon as the rotator is built.
    #[serde(default)]
    pub auto_start: bool,

    /// Compress the rotated file into a `.tar.gz` archive.
    #[serde(default)]
    pub archive: bool,

    /// Upload the (possibly archived) file to remote storage.
    #[serde(default)]
    pub upload: bool,

    /// Delete the local file once the preceding stages succeed.
    #[serde(default)]
    pub auto_delete: bool,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl RotationConfig {
    /// Log path, ignoring an empty value.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Configuration {
    /// Six-field cron expression (seconds first).
    pub schedule: String,
    pub gateway: GatewayConfig,
    pub rotation: RotationConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            // Hourly, on the hour
            schedule: "0 0 * * * *".to_string(),
            gateway: GatewayConfig::default(),
            rotation: RotationConfig::default(),
        }
    }
}

impl Configuration {
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    /// Validate settings that cannot be expressed through defaults.
    ///
    /// Cron syntax is checked when the scheduler is built.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rotation.connection_uri.trim().is_empty() {
            anyhow::bail!("rotation.connection_uri must be set");
        }

        if self.schedule.trim().is_empty() {
            anyhow::bail!("schedule must not be empty");
        }

        if self.gateway.connect_timeout.is_zero() {
            anyhow::bail!("gateway.connect_timeout must be positive");
        }

        if self.rotation.upload && !self.rotation.storage.is_configured() {
            tracing::debug!(
                "Upload is enabled but storage bucket or credentials are missing; upload will be skipped"
            );
        }

        Ok(())
    }
}
