//! Test configuration builder for creating rotation setups quickly.

use std::path::PathBuf;

use crate::config::{Configuration, StorageConfig};

/// Builder for rotation configurations used in tests.
///
/// Starts from the defaults with a local connection URI filled in, so the
/// result passes [`Configuration::validate`] unless a test breaks it on purpose.
#[derive(Debug, Clone)]
pub struct TestConfigBuilder {
    config: Configuration,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = Configuration::default();
        config.rotation.connection_uri = "mongodb://localhost:27017".to_string();
        Self { config }
    }

    pub fn with_schedule(mut self, schedule: &str) -> Self {
        self.config.schedule = schedule.to_string();
        self
    }

    pub fn with_connection_uri(mut self, uri: &str) -> Self {
        self.config.rotation.connection_uri = uri.to_string();
        self
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.rotation.log_path = Some(path.into());
        self
    }

    pub fn with_archive(mut self) -> Self {
        self.config.rotation.archive = true;
        self
    }

    pub fn with_upload(mut self) -> Self {
        self.config.rotation.upload = true;
        self
    }

    pub fn with_auto_delete(mut self) -> Self {
        self.config.rotation.auto_delete = true;
        self
    }

    pub fn with_auto_start(mut self) -> Self {
        self.config.rotation.auto_start = true;
        self
    }

    /// Fill in a bucket and a dummy credential pair.
    pub fn with_bucket(mut self, bucket: &str) -> Self {
        self.config.rotation.storage = StorageConfig {
            bucket: Some(bucket.to_string()),
            access_key_id: Some("test-access-key".to_string()),
            secret_access_key: Some("test-secret-key".to_string()),
            ..self.config.rotation.storage
        };
        self
    }

    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.config.rotation.storage.key_prefix = Some(prefix.to_string());
        self
    }

    pub fn build(self) -> Configuration {
        self.config
    }
}
