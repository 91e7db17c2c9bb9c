use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(#[from] calamine::Error),

    #[error("Email parse error: {0}")]
    EmailParseError(#[from] mailparse::MailParseError),

    #[error("Template error: {0}")]
    TemplateError(#[from] tera::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Not found: {path}")]
    NotFound { path: String, hint: String },

    #[error("Extraction error: {message}")]
    ExtractionError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Storage,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn not_found(path: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::NotFound {
            path: path.into(),
            hint: hint.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::IoError(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::ApiError(_) => ErrorCategory::Network,
            Self::StorageError { .. } | Self::NotFound { .. } | Self::ZipError(_) => {
                ErrorCategory::Storage
            }
            Self::IoError(_) => ErrorCategory::System,
            Self::CsvError(_)
            | Self::SerializationError(_)
            | Self::SpreadsheetError(_)
            | Self::EmailParseError(_)
            | Self::TemplateError(_)
            | Self::ExtractionError { .. }
            | Self::ProcessingError { .. }
            | Self::ValidationError { .. } => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // A missing step artefact only means a previous step has not run yet.
            Self::NotFound { .. } => ErrorSeverity::Low,
            Self::ApiError(_) | Self::ExtractionError { .. } => ErrorSeverity::Medium,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. }
            | Self::CsvError(_)
            | Self::SerializationError(_)
            | Self::SpreadsheetError(_)
            | Self::EmailParseError(_)
            | Self::TemplateError(_)
            | Self::ProcessingError { .. }
            | Self::ValidationError { .. } => ErrorSeverity::High,
            Self::IoError(_) | Self::ZipError(_) | Self::StorageError { .. } => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::NotFound { hint, .. } => hint.clone(),
            Self::ApiError(_) => {
                "Check network access and API keys, then rerun the failed step".to_string()
            }
            Self::MissingConfigError { field } => {
                format!("Set `{}` in the configuration file or environment", field)
            }
            Self::InvalidConfigValueError { field, .. }
            | Self::ConfigValidationError { field, .. } => {
                format!("Fix `{}` in the configuration file", field)
            }
            Self::ConfigError { .. } => "Review the configuration file".to_string(),
            Self::StorageError { .. } | Self::IoError(_) | Self::ZipError(_) => {
                "Check that the storage location exists and is writable".to_string()
            }
            Self::TemplateError(_) => "The report template failed to render".to_string(),
            _ => "Inspect the offending email or attachment and rerun with --verbose".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Could not reach a remote service: {}", self),
            ErrorCategory::Storage => format!("Storage problem: {}", self),
            ErrorCategory::Data => format!("Could not process price data: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}
