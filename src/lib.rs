pub mod analysis;
pub mod config;
pub mod core;
pub mod domain;
pub mod email;
pub mod extract;
pub mod report;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{LocalStorage, TomlConfig};

#[cfg(feature = "s3")]
pub use config::s3::S3Storage;

pub use core::{
    etl::EtlEngine,
    pipeline::{run_daily_pipeline, DailyRunReport, PricePipeline},
};
pub use domain::model::{PriceDiff, PriceRow, SummaryReport};
pub use utils::error::{EtlError, Result};
