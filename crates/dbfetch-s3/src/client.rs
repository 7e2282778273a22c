use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use rusoto_core::{HttpClient, Region, RusotoError};
use rusoto_credential::{DefaultCredentialsProvider, ProfileProvider};
use rusoto_s3::{
    GetObjectRequest, HeadObjectError, HeadObjectRequest, ListObjectsV2Request, S3Client, S3,
};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{BucketSummary, ListPage, ListRequest, ObjectBody, ObjectSummary};
use crate::store::ObjectStore;

const DEFAULT_PROFILE: &str = "default";
const AWS_CONFIG_FILE: &str = "AWS_CONFIG_FILE";
const DEFAULT_REGION: &str = "us-east-1";

/// How to reach and authenticate against the object store.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Region name, e.g. `us-east-1`. Taken from the profile, then from
    /// rusoto's environment lookup when unset.
    pub region: Option<String>,
    /// Custom endpoint for S3 compatible services.
    pub endpoint: Option<String>,
    /// Named profile from the shared credentials file.
    pub profile: Option<String>,
    /// Credentials file to read `profile` from instead of `~/.aws/credentials`.
    pub credentials_file: Option<PathBuf>,
}

impl ClientConfig {
    /// Provider for an explicitly chosen profile or credentials file. `None`
    /// leaves credentials to rusoto's default chain.
    pub fn profile_provider(&self) -> Result<Option<ProfileProvider>> {
        let provider = match (&self.profile, &self.credentials_file) {
            (profile, Some(path)) => ProfileProvider::with_configuration(
                path,
                profile.as_deref().unwrap_or(DEFAULT_PROFILE),
            ),
            (Some(profile), None) => ProfileProvider::with_default_credentials(profile.as_str())
                .map_err(|e| Error::store("failed to load aws profile", e))?,
            (None, None) => return Ok(None),
        };
        Ok(Some(provider))
    }

    /// Region to sign requests for. An explicit region wins, then the region
    /// stored with the selected profile, then rusoto's own lookup.
    pub fn region(&self, profile: Option<&ProfileProvider>) -> Result<Region> {
        let name = match &self.region {
            Some(name) => Some(name.clone()),
            None => profile.and_then(profile_region),
        };

        match (&self.endpoint, name) {
            (Some(endpoint), name) => Ok(Region::Custom {
                name: name.unwrap_or_else(|| DEFAULT_REGION.to_string()),
                endpoint: endpoint.clone(),
            }),
            (None, Some(name)) => Region::from_str(&name).map_err(|_| Error::InvalidRegion(name)),
            (None, None) => Ok(Region::default()),
        }
    }
}

/// `region` of the provider's profile, looked up in the shared config file
/// (`AWS_CONFIG_FILE` or `config` next to the credentials file) and then in
/// the credentials file itself.
fn profile_region(provider: &ProfileProvider) -> Option<String> {
    let config_file = env::var_os(AWS_CONFIG_FILE)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| provider.file_path().with_file_name("config"));
    let config = ProfileProvider::with_configuration(config_file, provider.profile());

    let region = [&config, provider]
        .into_iter()
        .find_map(|p| p.region_from_profile().ok().flatten());
    region
}

pub fn create_s3_client(config: &ClientConfig) -> Result<S3Client> {
    let profile = config.profile_provider()?;
    let region = config.region(profile.as_ref())?;
    debug!(?region, profile = ?config.profile, "creating s3 client");

    let dispatcher =
        HttpClient::new().map_err(|e| Error::store("failed to create http client", e))?;

    let client = match profile {
        Some(provider) => S3Client::new_with(dispatcher, provider, region),
        None => {
            let provider = DefaultCredentialsProvider::new()
                .map_err(|e| Error::store("failed to load aws credentials", e))?;
            S3Client::new_with(dispatcher, provider, region)
        }
    };

    Ok(client)
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_buckets(&self) -> Result<Vec<BucketSummary>> {
        debug!("list_buckets");
        let output = S3::list_buckets(self)
            .await
            .map_err(|e| Error::store("failed to list buckets", e))?;

        Ok(output
            .buckets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|bucket| {
                Some(BucketSummary {
                    name: bucket.name?,
                    created: bucket.creation_date,
                })
            })
            .collect())
    }

    async fn list_objects(&self, request: ListRequest) -> Result<ListPage> {
        debug!(
            bucket = %request.bucket,
            prefix = ?request.prefix,
            delimiter = ?request.delimiter,
            max_keys = request.max_keys,
            "list_objects_v2"
        );
        let context = format!(
            "failed to list objects in {} under {:?}",
            request.bucket,
            request.prefix.as_deref().unwrap_or("")
        );
        let list_req = ListObjectsV2Request {
            bucket: request.bucket,
            prefix: request.prefix,
            delimiter: request.delimiter,
            max_keys: Some(i64::try_from(request.max_keys).unwrap_or(i64::MAX)),
            continuation_token: request.continuation_token,
            ..Default::default()
        };

        let output = self
            .list_objects_v2(list_req)
            .await
            .map_err(|e| Error::store(context, e))?;

        let objects = output
            .contents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|obj| {
                Some(ObjectSummary {
                    key: obj.key?,
                    size: obj.size.and_then(|s| u64::try_from(s).ok()).unwrap_or(0),
                    last_modified: obj.last_modified,
                    e_tag: obj.e_tag,
                })
            })
            .collect();
        let common_prefixes = output
            .common_prefixes
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.prefix)
            .collect();
        let next_continuation_token = if output.is_truncated.unwrap_or(false) {
            output.next_continuation_token
        } else {
            None
        };

        Ok(ListPage {
            objects,
            common_prefixes,
            next_continuation_token,
        })
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        debug!(bucket, key, "head_object");
        let head_req = HeadObjectRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            ..Default::default()
        };

        match self.head_object(head_req).await {
            Ok(_) => Ok(true),
            Err(RusotoError::Service(HeadObjectError::NoSuchKey(_))) => Ok(false),
            // HEAD responses carry no body, so a missing key usually shows up
            // as a bare 404.
            Err(RusotoError::Unknown(ref response)) if response.status.as_u16() == 404 => {
                Ok(false)
            }
            Err(e) => Err(Error::store(format!("failed to check s3://{bucket}/{key}"), e)),
        }
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        debug!(bucket, key, "get_object");
        let get_req = GetObjectRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            ..Default::default()
        };

        let output = S3::get_object(self, get_req)
            .await
            .map_err(|e| Error::store(format!("failed to fetch s3://{bucket}/{key}"), e))?;
        let body = output.body.ok_or_else(|| {
            Error::store(
                format!("failed to fetch s3://{bucket}/{key}"),
                "response has no body",
            )
        })?;

        Ok(ObjectBody {
            reader: Box::pin(body.into_async_read()),
            e_tag: output.e_tag,
            content_length: output.content_length.and_then(|l| u64::try_from(l).ok()),
        })
    }
}
