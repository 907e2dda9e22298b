//! Input checks applied before a human message reaches the transport.

use crate::config::WidgetConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0}")]
    TooShort(String),
    #[error("{0}")]
    TooLong(String),
}

/// Length bounds plus the messages shown when they are violated.
#[derive(Debug, Clone)]
pub struct InputValidator {
    min_length: usize,
    max_length: usize,
    too_short: String,
    too_long: String,
}

impl InputValidator {
    pub fn new(min_length: usize, max_length: usize) -> Self {
        Self {
            min_length,
            max_length,
            too_short: format!("Min characters allowed: {}", min_length),
            too_long: format!("Max characters allowed: {}", max_length),
        }
    }

    pub fn from_config(config: &WidgetConfig) -> Self {
        let mut validator = Self::new(config.min_length, config.max_length);
        if let Some(text) = &config.min_length_error_text {
            validator.too_short = text.clone();
        }
        if let Some(text) = &config.max_length_error_text {
            validator.too_long = text.clone();
        }
        validator
    }

    /// Trim `raw` and check its length in characters.
    ///
    /// Returns the trimmed text on success.
    pub fn validate(&self, raw: &str) -> Result<String, ValidationError> {
        let text = raw.trim();
        let len = text.chars().count();

        if len < self.min_length {
            return Err(ValidationError::TooShort(self.too_short.clone()));
        }
        if len > self.max_length {
            return Err(ValidationError::TooLong(self.too_long.clone()));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_before_checking() {
        let v = InputValidator::new(3, 10);
        assert_eq!(v.validate("   hello  \n").unwrap(), "hello");
        assert_eq!(
            v.validate("  hi  "),
            Err(ValidationError::TooShort("Min characters allowed: 3".into()))
        );
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let v = InputValidator::new(3, 5);
        assert!(v.validate("abc").is_ok());
        assert!(v.validate("abcde").is_ok());
        assert_eq!(
            v.validate("abcdef"),
            Err(ValidationError::TooLong("Max characters allowed: 5".into()))
        );
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let v = InputValidator::new(1, 3);
        assert_eq!(v.validate("héé").unwrap(), "héé");
        assert!(v.validate("🦀🦀🦀").is_ok());
    }

    #[test]
    fn test_whitespace_only_is_too_short() {
        let v = InputValidator::new(1, 10);
        assert!(matches!(v.validate(" \t\n"), Err(ValidationError::TooShort(_))));
    }

    #[test]
    fn test_custom_messages_from_config() {
        let config = WidgetConfig {
            min_length: 2,
            min_length_error_text: Some("Say more".into()),
            max_length: 4,
            ..Default::default()
        };
        let v = InputValidator::from_config(&config);
        assert_eq!(v.validate("a").unwrap_err().to_string(), "Say more");
        assert_eq!(
            v.validate("abcde").unwrap_err().to_string(),
            "Max characters allowed: 4"
        );
    }
}
