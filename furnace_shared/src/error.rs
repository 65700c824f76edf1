use thiserror::Error;

/// Error codes the platform uses for retryable conditions.
pub const THROTTLING_CODE: &str = "ThrottlingException";
pub const INTERNAL_FAILURE_CODE: &str = "InternalFailureException";
pub const NOT_FOUND_CODE: &str = "ResourceNotFoundException";

/// Failure reported by an external platform call (catalog, reader or sink).
///
/// `Throttling` and `InternalFailure` are transient and may be retried;
/// every other variant is fatal for the call that produced it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SinkError {
    #[error("ThrottlingException: {0}")]
    Throttling(String),
    #[error("InternalFailureException: {0}")]
    InternalFailure(String),
    #[error("ResourceNotFoundException: {0}")]
    NotFound(String),
    #[error("{code}: {message}")]
    Service { code: String, message: String },
    #[error("I/O error: {0}")]
    Io(String),
}

impl SinkError {
    /// Map a platform error code onto the taxonomy.
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            THROTTLING_CODE => SinkError::Throttling(message),
            INTERNAL_FAILURE_CODE => SinkError::InternalFailure(message),
            NOT_FOUND_CODE => SinkError::NotFound(message),
            _ => SinkError::Service {
                code: code.to_string(),
                message,
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SinkError::Throttling(_) | SinkError::InternalFailure(_))
    }

    pub fn code(&self) -> &str {
        match self {
            SinkError::Throttling(_) => THROTTLING_CODE,
            SinkError::InternalFailure(_) => INTERNAL_FAILURE_CODE,
            SinkError::NotFound(_) => NOT_FOUND_CODE,
            SinkError::Service { code, .. } => code,
            SinkError::Io(_) => "IoError",
        }
    }
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    #[error("asset {asset_id} has no {channel} channel")]
    MissingChannel {
        asset_id: String,
        channel: &'static str,
    },
}
