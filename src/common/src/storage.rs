use anyhow::Result;
use object_store::{ObjectStore, aws::AmazonS3Builder};
use std::sync::Arc;

use crate::config::StorageConfig;

/// Create the remote store used for uploads.
///
/// Returns `Ok(None)` when no bucket or credentials are configured, which
/// disables the upload stage rather than failing.
pub fn create_object_store(storage_config: &StorageConfig) -> Result<Option<Arc<dyn ObjectStore>>> {
    if !storage_config.is_configured() {
        tracing::debug!("Remote storage not configured, uploads disabled");
        return Ok(None);
    }

    let builder = create_s3_builder(storage_config)?;
    Ok(Some(Arc::new(builder.build()?)))
}

/// Create an S3 builder for the configured bucket with explicit credentials.
///
/// Environment credentials are deliberately not consulted: a missing key in
/// the configuration means uploads are off.
pub fn create_s3_builder(storage_config: &StorageConfig) -> Result<AmazonS3Builder> {
    let bucket = storage_config
        .bucket()
        .ok_or_else(|| anyhow::anyhow!("Storage configuration must specify a bucket"))?;
    let access_key = storage_config
        .access_key_id
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Storage configuration must specify access_key_id"))?;
    let secret_key = storage_config
        .secret_access_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Storage configuration must specify secret_access_key"))?;

    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_region(&storage_config.region)
        .with_access_key_id(access_key)
        .with_secret_access_key(secret_key);

    // S3-compatible targets (MinIO, etc) need a custom endpoint and path-style URLs
    if let Some(endpoint) = storage_config.endpoint.as_deref().filter(|e| !e.is_empty()) {
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(endpoint.starts_with("http://"))
            .with_virtual_hosted_style_request(false);
    }

    Ok(builder)
}
