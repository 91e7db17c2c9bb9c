use crate::domain::model::SummaryReport;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// Drives a pipeline through extract, transform and load, logging each phase.
pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<SummaryReport> {
        tracing::info!("🚀 Starting ETL process...");

        // Extract
        tracing::info!("📥 Extracting price rows...");
        let rows = self.pipeline.extract().await?;
        tracing::info!("Extracted {} rows", rows.len());
        self.monitor.log_phase("extract", rows.len());

        // Transform
        tracing::info!("🔄 Comparing with previous snapshot...");
        let result = self.pipeline.transform(rows).await?;
        tracing::info!(
            "{} changes, {} new, {} removed",
            result.diff.summary.changes_count,
            result.diff.summary.new_count,
            result.diff.summary.removed_count
        );
        self.monitor.log_phase("transform", result.current.len());

        // Load
        tracing::info!("📤 Writing summary...");
        let report = self.pipeline.load(result).await?;
        tracing::info!("Summary saved to: {}", report.storage_path);
        self.monitor.log_phase("load", 1);

        self.monitor.log_final_stats();
        Ok(report)
    }
}
