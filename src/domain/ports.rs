use crate::domain::model::{PriceRow, SummaryReport, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Object-store style storage. Paths are `/`-separated keys such as
/// `logs/latest.json`; backends map them onto directories or buckets.
pub trait Storage: Send + Sync {
    /// Keys under `prefix` ending with `suffix`, sorted.
    fn list(&self, prefix: &str, suffix: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn read_file(&self, path: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    fn write_file(&self, path: &str, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    fn exists(&self, path: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Returns false when there was nothing to delete.
    fn delete(&self, path: &str) -> impl Future<Output = Result<bool>> + Send;

    fn copy(&self, from: &str, to: &str) -> impl Future<Output = Result<()>> + Send;

    /// URL an operator can download `path` from, valid for `expires_in`.
    fn public_url(
        &self,
        path: &str,
        expires_in: Duration,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Human readable location of `path` (`/data/logs/x.json`, `s3://bucket/logs/x.json`).
    fn location(&self, path: &str) -> String;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<PriceRow>>;
    async fn transform(&self, rows: Vec<PriceRow>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<SummaryReport>;
}

/// Pulls price rows out of unstructured text (email bodies, attachment text).
#[async_trait]
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(&self, text: &str, provider_hint: Option<&str>) -> Result<Vec<PriceRow>>;
}
