pub mod archive;
pub mod html;

pub use archive::build_archive;
pub use html::SummaryRenderer;
