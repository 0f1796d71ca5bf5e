//! Object store construction from a location URL

use std::sync::Arc;

use object_store::ObjectStore;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;

use crate::error::{Result, SourceError};

/// Build an object store for `url`
///
/// `gs://bucket` uses Google Cloud Storage with credentials from the
/// environment; `file:///dir` and plain paths use the local filesystem.
pub fn open_store(url: &str) -> Result<Arc<dyn ObjectStore>> {
    if let Some(bucket) = url.strip_prefix("gs://") {
        let bucket = bucket.trim_end_matches('/');
        if bucket.is_empty() || bucket.contains('/') {
            return Err(SourceError::unavailable(format!(
                "'{}' is not a bucket URL (use gs://bucket plus a prefix)",
                url
            )));
        }
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| {
                SourceError::unavailable(format!("failed to build GCS store for {}: {}", url, e))
            })?;
        return Ok(Arc::new(store));
    }

    let dir = url.strip_prefix("file://").unwrap_or(url);
    if let Some((scheme, _)) = dir.split_once("://") {
        return Err(SourceError::unavailable(format!(
            "unsupported storage scheme '{}'",
            scheme
        )));
    }
    let store = LocalFileSystem::new_with_prefix(dir)?;
    Ok(Arc::new(store))
}
