use aws_credential_types::Credentials;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

/// Default region when neither `S3UTIL_REGION` nor `AWS_REGION` is set.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings for an S3-compatible endpoint
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Custom endpoint, e.g. MinIO or DigitalOcean Spaces; `None` means AWS
    pub endpoint: Option<String>,
    pub region: String,
    /// Static credentials; both must be set, otherwise the default AWS
    /// provider chain is used
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: DEFAULT_REGION.to_string(),
            access_key: None,
            secret_key: None,
            path_style: false,
        }
    }
}

impl StorageConfig {
    /// Load from environment variables
    ///
    /// - `S3UTIL_ENDPOINT`
    /// - `S3UTIL_REGION`, falling back to `AWS_REGION`
    /// - `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
    /// - `S3UTIL_PATH_STYLE` (true/false)
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var("S3UTIL_ENDPOINT").ok().filter(|v| !v.is_empty()),
            region: env::var("S3UTIL_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            access_key: env::var("AWS_ACCESS_KEY_ID").ok(),
            secret_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            path_style: env::var("S3UTIL_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    pub fn for_minio(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: DEFAULT_REGION.to_string(),
            access_key: Some("minioadmin".to_string()),
            secret_key: Some("minioadmin".to_string()),
            path_style: true,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_path_style(mut self, path_style: bool) -> Self {
        self.path_style = path_style;
        self
    }

    /// Credentials to pin on the client, when both halves are configured
    pub fn static_credentials(&self) -> Option<Credentials> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some(Credentials::new(
                access,
                secret,
                None,
                None,
                "s3util-static",
            )),
            _ => None,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.region.trim().is_empty() {
            anyhow::bail!("Storage region cannot be empty");
        }

        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                anyhow::bail!(
                    "Storage endpoint '{}' must start with http:// or https://",
                    endpoint
                );
            }
        }

        if self.access_key.is_some() != self.secret_key.is_some() {
            tracing::warn!(
                "Only one of AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY is set; using the default credential chain"
            );
        }

        Ok(())
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("path_style", &self.path_style)
            .finish()
    }
}
