use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::{AssetStore, RETRIEVAL_URL_TTL, UPLOAD_CACHE_CONTROL};

/// S3 (or S3-compatible) asset store.
#[derive(Clone)]
pub struct S3AssetStore {
    client: Client,
    bucket: String,
    http: reqwest::Client,
}

impl S3AssetStore {
    /// Build a client from the ambient AWS configuration.
    pub async fn connect(config: &StorageConfig) -> Self {
        let shared = aws_config::load_from_env().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::new(Client::from_conf(builder.build()), config.bucket.clone())
    }

    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            http: reqwest::Client::new(),
        }
    }
}

fn backend<E, R>(err: SdkError<E, R>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    StorageError::Backend(DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl AssetStore for S3AssetStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .if_none_match("*")
            .content_type(content_type)
            .cache_control(UPLOAD_CACHE_CONTROL)
            .body(ByteStream::from(bytes))
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(key, "Uploaded asset");
                Ok(())
            }
            // 412: an object already exists under this key.
            Err(err) if err.raw_response().map(|r| r.status().as_u16()) == Some(412) => {
                Err(StorageError::AlreadyExists(key.to_string()))
            }
            Err(err) => Err(backend(err)),
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(err) => return Err(backend(err)),
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::SigningUnavailable(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::SigningUnavailable(DisplayErrorContext(&e).to_string()))?;
        Ok(request.uri().to_string())
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let url = match self.signed_url(key, RETRIEVAL_URL_TTL).await {
            Ok(url) => url,
            Err(StorageError::SigningUnavailable(reason)) => {
                tracing::warn!(key, %reason, "Signing failed, falling back to direct read");
                return self.get(key).await;
            }
            Err(err) => return Err(err),
        };

        let response = self.http.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let bytes = response.error_for_status()?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
