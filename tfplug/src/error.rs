//! Error types for tfplug

/// Error type for tfplug operations
#[derive(Debug, thiserror::Error)]
pub enum TfplugError {
    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Attribute not found: {0}")]
    AttributeNotFound(String),

    #[error("Invalid attribute path: {0}")]
    InvalidPath(String),

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TLS configuration error: {0}")]
    TlsError(String),

    #[error("Transport error: {0}")]
    TransportError(#[from] tonic::transport::Error),
}

/// Result type alias for tfplug operations
pub type Result<T> = std::result::Result<T, TfplugError>;

impl From<TfplugError> for tonic::Status {
    fn from(err: TfplugError) -> Self {
        match err {
            TfplugError::DecodingError(_) | TfplugError::TypeMismatch { .. } => {
                tonic::Status::invalid_argument(err.to_string())
            }
            _ => tonic::Status::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoding_failures_are_invalid_arguments() {
        let status: tonic::Status = TfplugError::DecodingError("bad msgpack".into()).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: tonic::Status = TfplugError::TypeMismatch {
            expected: "string".into(),
            actual: "number".into(),
        }
        .into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[test]
    fn other_failures_are_internal() {
        let status: tonic::Status = TfplugError::TlsError("no identity".into()).into();
        assert_eq!(status.code(), tonic::Code::Internal);
        assert!(status.message().contains("no identity"));
    }
}
