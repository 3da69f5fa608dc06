//! Core error types for TRELLIS.

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A remote invocation raised an error
    #[error("Invoke failed for {operation}: {message}")]
    Invoke {
        /// Operation that was invoked
        operation: String,
        /// Underlying error message
        message: String,
    },

    /// Validation error
    #[error("Validation failed for {field}: {reason}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Why validation failed
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Not found
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of object
        kind: String,
        /// Object identifier
        id: String,
    },

    /// Internal error (for unexpected errors)
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::Invoke {
            operation: "list_devices".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Invoke failed for list_devices: connection refused"
        );

        let err = CoreError::NotFound {
            kind: "Result".to_string(),
            id: "get_device".to_string(),
        };
        assert_eq!(format!("{}", err), "Result not found: get_device");
    }

    #[test]
    fn test_error_equality() {
        let err1 = CoreError::Serialization("bad value".to_string());
        let err2 = CoreError::Serialization("bad value".to_string());
        assert_eq!(err1, err2);

        let err3 = CoreError::Internal {
            message: "bad value".to_string(),
        };
        assert_ne!(err1, err3);
    }

    #[test]
    fn test_from_serde_error() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CoreError = serde_err.into();
        assert!(matches!(err, CoreError::Serialization(_)));
    }
}
