use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{config::Region, error::DisplayErrorContext, primitives::ByteStream, Client};
use tokio::fs::File;
use tracing::{debug, info, instrument};

use super::config::StorageConfig;
use super::{ObjectReader, ObjectStore};

/// [`ObjectStore`] backed by the AWS SDK
#[derive(Clone, Debug)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        debug!("Initializing storage with config: {:?}", config);

        config.validate()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some(credentials) = config.static_credentials() {
            loader = loader.credentials_provider(credentials);
        }

        let shared_config = loader.load().await;

        let mut s3_config_builder =
            aws_sdk_s3::config::Builder::from(&shared_config).force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!(
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            "Storage client initialized"
        );

        Ok(Self { client })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(skip(self, body))]
    async fn put(&self, bucket: &str, key: &str, body: File, content_length: u64) -> Result<()> {
        debug!("Uploading {} bytes to s3://{}/{}", content_length, bucket, key);

        // Single PutObject; multipart chunking is left to the SDK's transfer tooling
        let stream = ByteStream::read_from()
            .file(body)
            .build()
            .await
            .context("Failed to open upload body")?;

        let content_length =
            i64::try_from(content_length).context("Upload body too large for PutObject")?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(stream)
            .content_length(content_length)
            .send()
            .await
            .map_err(|e| anyhow!("{}", DisplayErrorContext(&e)))
            .context("PutObject request failed")?;

        info!("Successfully uploaded to s3://{}/{}", bucket, key);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectReader> {
        debug!("Getting stream from s3://{}/{}", bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow!("{}", DisplayErrorContext(&e)))
            .context("GetObject request failed")?;

        Ok(Box::pin(response.body.into_async_read()))
    }

    #[instrument(skip(self))]
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        debug!("Listing objects in s3://{}/{}", bucket, prefix);

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| anyhow!("{}", DisplayErrorContext(&e)))
                .context("ListObjectsV2 request failed")?;

            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(|k| k.to_string())),
            );
        }

        debug!("Listed {} keys under s3://{}/{}", keys.len(), bucket, prefix);

        Ok(keys)
    }
}
