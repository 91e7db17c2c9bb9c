use crate::utils::error::{EtlError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(EtlError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

/// Storage prefixes are object keys: relative, `/`-terminated, no `..`.
pub fn validate_prefix(field_name: &str, prefix: &str) -> Result<()> {
    validate_path(field_name, prefix)?;

    let reason = if prefix.starts_with('/') {
        Some("Prefix must be relative")
    } else if !prefix.ends_with('/') {
        Some("Prefix must end with '/'")
    } else if prefix.split('/').any(|segment| segment == "..") {
        Some("Prefix cannot contain '..'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: prefix.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| EtlError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_currency_code(field_name: &str, value: &str) -> Result<()> {
    if value.len() != 3 || !value.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Currency must be a three-letter upper-case code such as EUR".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("llm.endpoint", "https://example.com").is_ok());
        assert!(validate_url("llm.endpoint", "http://127.0.0.1:8080").is_ok());
        assert!(validate_url("llm.endpoint", "").is_err());
        assert!(validate_url("llm.endpoint", "invalid-url").is_err());
        assert!(validate_url("llm.endpoint", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_prefix() {
        assert!(validate_prefix("storage.layout.logs", "logs/").is_ok());
        assert!(validate_prefix("storage.layout.logs", "a/b/").is_ok());
        assert!(validate_prefix("storage.layout.logs", "logs").is_err());
        assert!(validate_prefix("storage.layout.logs", "/logs/").is_err());
        assert!(validate_prefix("storage.layout.logs", "../logs/").is_err());
    }

    #[test]
    fn test_validate_currency_code() {
        assert!(validate_currency_code("pipeline.base_currency", "EUR").is_ok());
        assert!(validate_currency_code("pipeline.base_currency", "eur").is_err());
        assert!(validate_currency_code("pipeline.base_currency", "EURO").is_err());
    }

    #[test]
    fn test_validate_range_and_minimum() {
        assert!(validate_range("analysis.anomaly_threshold_percent", 50.0, 0.0, 1000.0).is_ok());
        assert!(validate_range("analysis.anomaly_threshold_percent", -1.0, 0.0, 1000.0).is_err());
        assert!(validate_positive_number("currency.timeout_seconds", 0, 1).is_err());
        assert!(validate_required_field("storage.bucket", &None::<String>).is_err());
    }
}
