use crate::config::toml_config::StorageConfig;
use crate::core::Storage;
use crate::utils::error::{EtlError, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::time::Duration;

fn storage_error(action: &str, key: &str, err: impl std::error::Error) -> EtlError {
    EtlError::StorageError {
        message: format!("Failed to {} {}: {}", action, key, DisplayErrorContext(err)),
    }
}

fn content_type(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("json") => "application/json",
        Some("html") => "text/html; charset=utf-8",
        Some("zip") => "application/zip",
        Some("eml") => "message/rfc822",
        Some("csv") => "text/csv",
        _ => "application/octet-stream",
    }
}

/// Bucket storage for S3-compatible object stores.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Builds a client from the ambient AWS credentials chain.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let bucket = config
            .bucket
            .clone()
            .ok_or_else(|| EtlError::MissingConfigError {
                field: "storage.bucket".to_string(),
            })?;

        let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(region) = &config.region {
            builder = builder.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::info!("✅ Bucket storage initialized: s3://{}", bucket);
        Ok(Self::new(S3Client::from_conf(builder.build()), bucket))
    }
}

impl Storage for S3Storage {
    async fn list(&self, prefix: &str, suffix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| storage_error("list", prefix, e))?;

            keys.extend(
                resp.contents()
                    .iter()
                    .filter_map(|obj| obj.key())
                    .filter(|key| key.ends_with(suffix))
                    .map(str::to_string),
            );

            match resp.next_continuation_token() {
                Some(next) if resp.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string())
                }
                _ => break,
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    EtlError::not_found(self.location(path), "Check that the previous step ran")
                } else {
                    storage_error("read", path, service_error)
                }
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| storage_error("download", path, e))?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .content_type(content_type(path))
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| storage_error("write", path, e))?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(storage_error("inspect", path, service_error))
                }
            }
        }
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        if !self.exists(path).await? {
            return Ok(false);
        }
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| storage_error("delete", path, e))?;
        Ok(true)
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, from))
            .key(to)
            .send()
            .await
            .map_err(|e| storage_error("copy", from, e))?;
        Ok(())
    }

    async fn public_url(&self, path: &str, expires_in: Duration) -> Result<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| storage_error("presign", path, e))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .presigned(presigning)
            .await
            .map_err(|e| storage_error("presign", path, e))?;
        Ok(request.uri().to_string())
    }

    fn location(&self, path: &str) -> String {
        format!("s3://{}/{}", self.bucket, path)
    }
}
