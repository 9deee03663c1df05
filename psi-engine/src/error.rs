//! Error types for the PSI engine.

use thiserror::Error;

/// Errors that can occur while running either side of the PSI protocol.
///
/// Every operation fails closed: when one of these is returned, no partial
/// result has been produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PsiError {
    /// Bytes that should hold a compressed Ristretto point do not decode to a
    /// group element.
    #[error("Invalid point encoding: {0}")]
    InvalidEncoding(String),

    /// A caller-supplied parameter is out of range.
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A wire buffer could not be deserialized.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Input data was empty.
    #[error("Input data cannot be empty")]
    EmptyInput,

    /// A session method was invoked out of order.
    #[error("Cannot call `{operation}` in session state `{state}`")]
    SessionState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The state the session was in.
        state: &'static str,
    },

    /// The response does not carry one element per request element.
    #[error("Response has {actual} elements but the request had {expected}")]
    MismatchedLength {
        /// Number of elements in the originating request.
        expected: usize,
        /// Number of elements in the response.
        actual: usize,
    },

    /// Intersection indices were requested from a count-only client.
    #[error("Client was created without reveal_intersection; only the size is available")]
    RevealDisabled,
}

impl PsiError {
    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        PsiError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        PsiError::MalformedMessage(reason.into())
    }
}

/// Result type for PSI operations.
pub type Result<T> = std::result::Result<T, PsiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", PsiError::EmptyInput),
            "Input data cannot be empty"
        );
        assert_eq!(
            format!("{}", PsiError::InvalidEncoding("test".to_string())),
            "Invalid point encoding: test"
        );
        assert_eq!(
            format!("{}", PsiError::invalid_parameter("fpr", "must be in (0, 1)")),
            "Invalid parameter `fpr`: must be in (0, 1)"
        );
        assert_eq!(
            format!("{}", PsiError::malformed("truncated")),
            "Malformed message: truncated"
        );
        assert_eq!(
            format!(
                "{}",
                PsiError::SessionState {
                    operation: "get_intersection",
                    state: "created",
                }
            ),
            "Cannot call `get_intersection` in session state `created`"
        );
        assert_eq!(
            format!(
                "{}",
                PsiError::MismatchedLength {
                    expected: 3,
                    actual: 2,
                }
            ),
            "Response has 2 elements but the request had 3"
        );
    }

    #[test]
    fn test_result_type() {
        let ok_result: Result<()> = Ok(());
        let err_result: Result<()> = Err(PsiError::EmptyInput);
        assert!(ok_result.is_ok());
        assert!(err_result.is_err());
    }
}
