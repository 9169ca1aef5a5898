//! Error types for linode-ddns.

use thiserror::Error;

/// Result type alias for linode-ddns.
pub type Result<T> = std::result::Result<T, DdnsError>;

/// DDNS error types.
#[derive(Error, Debug)]
pub enum DdnsError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The remote service could not be reached.
    #[error("Unreachable: {0}")]
    Unreachable(String),

    /// The remote service did not answer in time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The provider understood the request and refused it.
    #[error("Rejected by provider: {0}")]
    RemoteRejected(String),

    /// The response payload did not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DdnsError {
    /// Whether the provider explicitly refused the operation.
    pub fn is_rejection(&self) -> bool {
        matches!(self, DdnsError::RemoteRejected(_))
    }
}

impl From<reqwest::Error> for DdnsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DdnsError::Timeout(e.to_string())
        } else if e.is_decode() {
            DdnsError::MalformedResponse(e.to_string())
        } else {
            DdnsError::Unreachable(e.to_string())
        }
    }
}

impl From<toml::de::Error> for DdnsError {
    fn from(e: toml::de::Error) -> Self {
        DdnsError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for DdnsError {
    fn from(e: toml::ser::Error) -> Self {
        DdnsError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for DdnsError {
    fn from(e: serde_json::Error) -> Self {
        DdnsError::MalformedResponse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_is_malformed() {
        let err = serde_json::from_str::<Vec<u32>>("{not json").unwrap_err();
        assert!(matches!(DdnsError::from(err), DdnsError::MalformedResponse(_)));
    }

    #[test]
    fn test_rejection_kind() {
        assert!(DdnsError::RemoteRejected("nope".into()).is_rejection());
        assert!(!DdnsError::Unreachable("down".into()).is_rejection());
    }
}
