#[cfg(feature = "cli")]
pub mod cli;
pub mod local;
#[cfg(feature = "s3")]
pub mod s3;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use local::LocalStorage;
pub use toml_config::TomlConfig;
