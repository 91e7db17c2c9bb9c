use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use sms_price_etl::config::cli::{Command, LogFormat};
use sms_price_etl::config::toml_config::StorageBackend;
use sms_price_etl::core::Storage;
use sms_price_etl::utils::{logger, validation::Validate};
use sms_price_etl::{
    run_daily_pipeline, CliConfig, EtlError, LocalStorage, PricePipeline, TomlConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    match cli.log_format {
        LogFormat::Text => logger::init_cli_logger(cli.verbose),
        LogFormat::Json => logger::init_json_logger(cli.verbose),
    }

    tracing::info!("Starting price-monitor ({:?})", cli.command());
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(err) = execute(&cli).await {
        let code = report_error(&err);
        if code > 0 {
            std::process::exit(code);
        }
    }

    Ok(())
}

async fn execute(cli: &CliConfig) -> anyhow::Result<()> {
    let config = cli.load_config()?;

    // 驗證配置
    config.validate()?;

    if config.monitoring_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    let date = cli
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    match config.storage.backend {
        StorageBackend::Local => {
            let storage = LocalStorage::new(&config.storage.root);
            dispatch(storage, config, cli, date).await
        }
        StorageBackend::S3 => dispatch_s3(config, cli, date).await,
    }
}

#[cfg(feature = "s3")]
async fn dispatch_s3(config: TomlConfig, cli: &CliConfig, date: NaiveDate) -> anyhow::Result<()> {
    let storage = sms_price_etl::S3Storage::from_config(&config.storage).await?;
    dispatch(storage, config, cli, date).await
}

#[cfg(not(feature = "s3"))]
async fn dispatch_s3(_config: TomlConfig, _cli: &CliConfig, _date: NaiveDate) -> anyhow::Result<()> {
    Err(EtlError::InvalidConfigValueError {
        field: "storage.backend".to_string(),
        value: "s3".to_string(),
        reason: "this binary was built without the `s3` feature".to_string(),
    }
    .into())
}

async fn dispatch<S: Storage>(
    storage: S,
    config: TomlConfig,
    cli: &CliConfig,
    date: NaiveDate,
) -> anyhow::Result<()> {
    let monitor_enabled = config.monitoring_enabled();
    let pipeline = PricePipeline::new(storage, config, date)?;

    if cli.dry_run {
        let keys = pipeline.dry_run().await?;
        println!("🔍 Dry run: {} emails would be processed", keys.len());
        for key in keys {
            println!("  {}", pipeline.storage().location(&key));
        }
        return Ok(());
    }

    match cli.command() {
        Command::Fetch => {
            let copied = pipeline.fetch_emails().await?;
            println!("📬 Fetched {} emails, ready for processing", copied);
        }
        Command::Extract => {
            let rows = pipeline.extract_rows().await?;
            println!(
                "📥 Extracted {} price records. Saved to {}",
                rows.len(),
                pipeline.storage().location(&pipeline.extraction_path())
            );
        }
        Command::Diff => {
            let result = pipeline.diff_and_snapshot().await?;
            println!(
                "🔄 Diff complete. Found {} changes, {} new routes. Saved to {}",
                result.diff.summary.changes_count,
                result.diff.summary.new_count,
                pipeline.storage().location(&pipeline.diff_path())
            );
        }
        Command::Summary => {
            let report = pipeline.generate_summary().await?;
            let json = serde_json::to_string_pretty(&report).context("serializing summary report")?;
            println!("{}", json);
        }
        Command::Run => {
            let report = run_daily_pipeline(pipeline, monitor_enabled).await?;
            tracing::info!("✅ Daily pipeline completed successfully!");
            let json = serde_json::to_string_pretty(&report).context("serializing run report")?;
            println!("{}", json);
        }
    }

    Ok(())
}

/// Prints the error for the operator and returns the process exit code.
fn report_error(err: &anyhow::Error) -> i32 {
    let Some(etl) = err.downcast_ref::<EtlError>() else {
        tracing::error!("❌ {:#}", err);
        eprintln!("❌ {:#}", err);
        return 1;
    };

    if etl.is_not_found() {
        // 缺少前一步的產出，提示操作者即可
        tracing::warn!("⚠️  {}", etl);
        eprintln!("⚠️  {}", etl.user_friendly_message());
        eprintln!("💡 {}", etl.recovery_suggestion());
        return etl.exit_code();
    }

    tracing::error!(
        "❌ Price monitor failed: {} (Category: {:?}, Severity: {:?})",
        etl,
        etl.category(),
        etl.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", etl.recovery_suggestion());
    eprintln!("❌ {}", etl.user_friendly_message());
    eprintln!("💡 Suggestion: {}", etl.recovery_suggestion());
    etl.exit_code()
}
