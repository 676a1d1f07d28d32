//! Core error types for STEM.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Value could not be encoded or decoded as JSON
    InvalidEncoding {
        /// Underlying serializer message
        message: String,
    },

    /// A value had a different shape than expected
    UnexpectedValue {
        /// What was expected
        expected: String,
        /// What was found
        found: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEncoding { message } => write!(f, "Invalid encoding: {}", message),
            Self::UnexpectedValue { expected, found } => {
                write!(f, "Unexpected value: expected {}, got {}", expected, found)
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidEncoding {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::UnexpectedValue {
            expected: "sequence".to_string(),
            found: "number".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Unexpected value: expected sequence, got number"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let err: CoreError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, CoreError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_error_equality() {
        let err1 = CoreError::InvalidEncoding {
            message: "x".to_string(),
        };
        let err2 = CoreError::InvalidEncoding {
            message: "x".to_string(),
        };
        assert_eq!(err1, err2);
    }
}
