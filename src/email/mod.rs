pub mod attachments;
pub mod reader;

pub use attachments::attachment_text;
pub use reader::{parse_eml, read_inbox};
