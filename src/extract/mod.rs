//! Price row extraction from emails: HTML tables, CSV/XLSX attachments and
//! free text (rule based or LLM).

pub mod html;
pub mod llm;
pub mod message;
pub mod normalize;
pub mod rules;
pub mod table;
pub mod tabular;

pub use llm::GeminiExtractor;
pub use message::MessageExtractor;
pub use rules::RuleBasedExtractor;
pub use table::{rows_from_table, Table};
