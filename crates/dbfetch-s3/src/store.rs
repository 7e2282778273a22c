use async_trait::async_trait;

use crate::error::Result;
use crate::model::{BucketSummary, ListPage, ListRequest, ObjectBody};

/// The object store operations the listing and download paths need.
///
/// Implemented for [`rusoto_s3::S3Client`]; tests provide an in-memory one.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_buckets(&self) -> Result<Vec<BucketSummary>>;

    async fn list_objects(&self, request: ListRequest) -> Result<ListPage>;

    /// `Ok(false)` when the key is absent, errors only for store failures.
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody>;
}
