pub mod etl;
pub mod pipeline;

pub use crate::domain::model::{PriceRow, SummaryReport, TransformResult};
pub use crate::domain::ports::{Pipeline, Storage, TextExtractor};
pub use crate::utils::error::Result;
