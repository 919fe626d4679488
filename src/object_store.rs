//! Image listing on object storage.
//!
//! Images live in a Cloud Storage bucket which is reached through its S3-compatible XML API, so
//! the AWS SDK for S3 does the listing. Public links are built from a separate base URL.

use crate::error::PastizalesError;
use crate::metrics::record_upstream_call;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use tracing::Instrument;
use url::Url;

const SERVICE: &str = "storage";

/// Object storage credentials
#[derive(Clone, Eq, Hash, PartialEq)]
pub enum StorageCredentials {
    /// HMAC key pair
    AccessKey {
        access_key: String,
        secret_key: String,
    },
    /// Anonymous access to a public bucket
    None,
}

impl StorageCredentials {
    /// Create an access key credential.
    pub fn access_key(access_key: &str, secret_key: &str) -> Self {
        StorageCredentials::AccessKey {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    /// Access key credentials when both halves are present, otherwise anonymous.
    pub fn from_keys(access_key: Option<&str>, secret_key: Option<&str>) -> Self {
        match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => Self::access_key(access_key, secret_key),
            _ => StorageCredentials::None,
        }
    }
}

/// Listing of stored objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Return public URLs of the objects below a prefix, directory placeholders excluded.
    async fn list_public_urls(&self, prefix: &str) -> Result<Vec<String>, PastizalesError>;
}

/// Object store client for one bucket.
#[derive(Clone)]
pub struct BucketClient {
    /// Underlying AWS SDK S3 client object.
    client: Client,
    bucket: String,
    /// Base of the public object URLs
    public_url: Url,
}

impl BucketClient {
    /// Creates a BucketClient object
    ///
    /// # Arguments
    ///
    /// * `url`: S3-compatible API URL
    /// * `credentials`: Object storage account credentials
    /// * `bucket`: Name of the bucket
    /// * `public_url`: Base of the public object URLs
    pub fn new(url: &Url, credentials: StorageCredentials, bucket: &str, public_url: Url) -> Self {
        let region = Region::new("auto");
        let builder = aws_sdk_s3::Config::builder().behavior_version(BehaviorVersion::latest());
        let builder = match credentials {
            StorageCredentials::AccessKey {
                access_key,
                secret_key,
            } => {
                let credentials = Credentials::from_keys(access_key, secret_key, None);
                builder.credentials_provider(credentials)
            }
            StorageCredentials::None => builder,
        };
        let s3_config = builder
            .region(Some(region))
            .endpoint_url(url.to_string())
            .force_path_style(true)
            .build();
        tracing::info!("Creating object store client for {}", url);
        Self {
            client: Client::from_conf(s3_config),
            bucket: bucket.to_string(),
            public_url,
        }
    }

    /// Lists every key below a prefix, following continuation tokens.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, PastizalesError> {
        let mut keys = vec![];
        let mut continuation_token = None;
        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token)
                .send()
                .instrument(tracing::Span::current())
                .await
                .map_err(|e| {
                    record_upstream_call(SERVICE, false);
                    PastizalesError::from(e)
                })?;
            record_upstream_call(SERVICE, true);
            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );
            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string())
                }
                _ => break,
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for BucketClient {
    #[tracing::instrument(level = "DEBUG", skip(self))]
    async fn list_public_urls(&self, prefix: &str) -> Result<Vec<String>, PastizalesError> {
        let keys = self.list_keys(prefix).await?;
        Ok(keys
            .iter()
            .filter(|key| !is_placeholder(key))
            .filter_map(|key| public_url(&self.public_url, &self.bucket, key))
            .map(String::from)
            .collect())
    }
}

/// Whether a key is a directory placeholder rather than an object.
pub fn is_placeholder(key: &str) -> bool {
    key.is_empty() || key.ends_with('/')
}

/// Build the percent-encoded public URL of an object.
///
/// Returns `None` if the base URL cannot hold a path.
pub fn public_url(base: &Url, bucket: &str, key: &str) -> Option<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .push(bucket)
        .extend(key.split('/'));
    Some(url)
}
