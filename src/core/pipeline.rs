use crate::analysis::{compare_prices, CurrencyConverter};
use crate::config::toml_config::TomlConfig;
use crate::core::etl::EtlEngine;
use crate::core::{Pipeline, Storage};
use crate::domain::model::{PriceDiff, PriceRow, SummaryReport, TransformResult};
use crate::email::read_inbox;
use crate::extract::MessageExtractor;
use crate::report::{build_archive, SummaryRenderer};
use crate::utils::error::{EtlError, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Outcome of `run_daily_pipeline`.
#[derive(Debug, Clone, Serialize)]
pub struct DailyRunReport {
    pub status: String,
    pub message: String,
    pub download_url: String,
    pub summary: String,
    pub report: SummaryReport,
}

/// The daily price monitoring pipeline over a storage backend.
///
/// Every artefact name carries the run date, so the steps can be run one at
/// a time (`fetch`, `extract`, `diff`, `summary`) or chained by the ETL engine.
pub struct PricePipeline<S: Storage> {
    storage: S,
    config: TomlConfig,
    stamp: String,
    extractor: MessageExtractor,
    converter: CurrencyConverter,
    renderer: SummaryRenderer,
}

impl<S: Storage> PricePipeline<S> {
    pub fn new(storage: S, config: TomlConfig, date: NaiveDate) -> Result<Self> {
        let extractor = MessageExtractor::from_config(&config)?;
        let converter = CurrencyConverter::new(&config.currency, config.currency_api_key());
        let renderer = SummaryRenderer::new()?;

        tracing::debug!(
            "Pipeline {} for {} (text extractor: {})",
            config.pipeline.name,
            date,
            extractor.text_extractor_name()
        );

        Ok(Self {
            storage,
            config,
            stamp: date.format("%Y-%m-%d").to_string(),
            extractor,
            converter,
            renderer,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    fn logs_path(&self, name: &str) -> String {
        format!("{}{}_{}.json", self.config.storage.layout.logs, name, self.stamp)
    }

    pub fn extraction_path(&self) -> String {
        self.logs_path("extraction")
    }

    pub fn parsed_path(&self) -> String {
        self.logs_path("parsed")
    }

    pub fn diff_path(&self) -> String {
        self.logs_path("diff")
    }

    pub fn latest_path(&self) -> String {
        format!("{}latest.json", self.config.storage.layout.logs)
    }

    pub fn summary_path(&self) -> String {
        format!("{}summary_{}.html", self.config.storage.layout.summaries, self.stamp)
    }

    pub fn archive_path(&self) -> String {
        format!("{}report_{}.zip", self.config.storage.layout.summaries, self.stamp)
    }

    async fn write_json<T: Serialize + ?Sized>(&self, path: &str, value: &T) -> Result<()> {
        let data = serde_json::to_vec_pretty(value)?;
        self.storage.write_file(path, &data).await?;
        tracing::debug!("Wrote {} ({} bytes)", path, data.len());
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &str, hint: &str) -> Result<T> {
        let data = match self.storage.read_file(path).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => return Err(EtlError::not_found(path, hint)),
            Err(e) => return Err(e),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    /// Previous snapshot, empty on the first run or when it cannot be read.
    async fn load_previous(&self) -> Vec<PriceRow> {
        let path = self.latest_path();
        match self.read_json::<Vec<PriceRow>>(&path, "").await {
            Ok(rows) => rows,
            Err(e) if e.is_not_found() => {
                tracing::info!("No previous prices at {} (normal for the first run)", path);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("Error loading previous prices from {}: {}", path, e);
                Vec::new()
            }
        }
    }

    /// Emails the next `extract` would read. Writes nothing.
    pub async fn dry_run(&self) -> Result<Vec<String>> {
        let layout = &self.config.storage.layout;
        let mut keys = self.storage.list(&layout.emails, ".eml").await?;
        if let Some(max) = self.config.max_messages() {
            keys.truncate(max);
        }
        for key in &keys {
            tracing::info!("🔍 Would process {}", self.storage.location(key));
        }
        Ok(keys)
    }

    /// Copies `emails/*.eml` into the inbox folder. Returns the copied count.
    pub async fn fetch_emails(&self) -> Result<usize> {
        let layout = &self.config.storage.layout;
        let keys = self.storage.list(&layout.emails, ".eml").await?;
        if keys.is_empty() {
            tracing::warn!("No .eml files found in {}", self.storage.location(&layout.emails));
            return Ok(0);
        }

        let mut copied = 0;
        for key in &keys {
            let filename = key.rsplit('/').next().unwrap_or(key);
            let dest = format!("{}{}", layout.inbox, filename);
            match self.storage.copy(key, &dest).await {
                Ok(()) => copied += 1,
                Err(e) => tracing::warn!("Error copying {}: {}", key, e),
            }
        }

        tracing::info!("📬 Copied {} emails to {}", copied, layout.inbox);
        Ok(copied)
    }

    /// Extracts and normalizes rows from the inbox and saves them as the
    /// extraction of the day.
    pub async fn extract_rows(&self) -> Result<Vec<PriceRow>> {
        let layout = &self.config.storage.layout;
        let messages = read_inbox(&self.storage, &layout.inbox, self.config.max_messages()).await?;

        let rows = self.extractor.extract_all(&messages).await;
        tracing::info!("Extracted {} rows from {} messages", rows.len(), messages.len());

        // 統一換算成基準幣別
        let rows = self
            .converter
            .normalize_rows(rows, &self.config.pipeline.base_currency)
            .await;

        let path = self.extraction_path();
        self.write_json(&path, &rows).await?;
        tracing::info!("Extraction saved: {}", path);
        Ok(rows)
    }

    /// Compares `rows` with the previous snapshot, then rotates the snapshot
    /// and saves the diff.
    pub async fn snapshot(&self, rows: Vec<PriceRow>) -> Result<TransformResult> {
        let previous = self.load_previous().await;
        tracing::info!("Loaded {} previous prices", previous.len());

        let diff = compare_prices(
            &rows,
            &previous,
            self.config.analysis.anomaly_threshold_percent,
        );

        self.write_json(&self.parsed_path(), &rows).await?;
        self.write_json(&self.latest_path(), &rows).await?;
        let diff_path = self.diff_path();
        self.write_json(&diff_path, &diff).await?;
        tracing::info!("Diff saved: {}", diff_path);

        Ok(TransformResult { current: rows, diff })
    }

    /// Diffs the extraction of the day against the previous snapshot.
    pub async fn diff_and_snapshot(&self) -> Result<TransformResult> {
        let rows: Vec<PriceRow> = self
            .read_json(
                &self.extraction_path(),
                "No extraction found for this date. Run `price-monitor extract` first.",
            )
            .await?;
        self.snapshot(rows).await
    }

    /// Renders, stores and links the summary for `diff`.
    pub async fn publish(&self, diff: &PriceDiff, current: &[PriceRow]) -> Result<SummaryReport> {
        let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let html = self.renderer.render(
            diff,
            &self.config.pipeline.summary_title,
            &self.config.pipeline.base_currency,
            &generated_at,
        )?;

        let summary_path = self.summary_path();
        self.storage.write_file(&summary_path, html.as_bytes()).await?;
        tracing::info!("Summary saved: {}", self.storage.location(&summary_path));

        let archive_path = if self.config.load.archive {
            let path = self.archive_path();
            let zip_data = build_archive(&html, diff, current)?;
            tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
            self.storage.write_file(&path, &zip_data).await?;
            Some(path)
        } else {
            None
        };

        let expires_in = Duration::from_secs(self.config.storage.url_expiration_seconds);
        let download_url = match self.storage.public_url(&summary_path, expires_in).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("⚠️  Could not generate a download URL: {}", e);
                self.storage.location(&summary_path)
            }
        };

        Ok(SummaryReport {
            storage_path: self.storage.location(&summary_path),
            download_url,
            summary: diff.headline(),
            archive_path: archive_path.map(|p| self.storage.location(&p)),
        })
    }

    /// Renders the summary for the diff of the day.
    pub async fn generate_summary(&self) -> Result<SummaryReport> {
        let diff: PriceDiff = self
            .read_json(
                &self.diff_path(),
                "No diff found for this date. Run `price-monitor diff` first.",
            )
            .await?;

        let current = match self.read_json::<Vec<PriceRow>>(&self.parsed_path(), "").await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::debug!("No parsed snapshot for the archive: {}", e);
                Vec::new()
            }
        };

        self.publish(&diff, &current).await
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for PricePipeline<S> {
    async fn extract(&self) -> Result<Vec<PriceRow>> {
        self.extract_rows().await
    }

    async fn transform(&self, rows: Vec<PriceRow>) -> Result<TransformResult> {
        self.snapshot(rows).await
    }

    async fn load(&self, result: TransformResult) -> Result<SummaryReport> {
        self.publish(&result.diff, &result.current).await
    }
}

/// Fetch, then extract, diff and summarize through the ETL engine.
pub async fn run_daily_pipeline<S: Storage>(
    pipeline: PricePipeline<S>,
    monitor_enabled: bool,
) -> Result<DailyRunReport> {
    tracing::info!("Starting daily pipeline for {}", pipeline.stamp());

    let fetched = pipeline.fetch_emails().await?;
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);
    let report = engine.run().await?;

    let pipeline = engine.pipeline();
    let diff_path = pipeline.diff_path();
    let diff: PriceDiff = pipeline
        .read_json(&diff_path, "The diff was not written. Run `price-monitor diff` to rebuild it.")
        .await?;

    tracing::info!("Pipeline complete");
    Ok(DailyRunReport {
        status: "success".to_string(),
        message: "Daily pipeline completed successfully".to_string(),
        download_url: report.download_url.clone(),
        summary: format!(
            "Fetch: {} emails copied to the inbox\nExtract: {}\nDiff: {} changes, {} new routes. Saved to {}\nSummary: {}",
            fetched,
            pipeline.extraction_path(),
            diff.summary.changes_count,
            diff.summary.new_count,
            diff_path,
            report.summary
        ),
        report,
    })
}
