use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct};
use serde_json::Value;

/// Failure classes a fetch can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request never produced an HTTP response.
    NetworkFailure,
    /// HTTP 429 or a vendor payload saying the same.
    RateLimited,
    /// Well-formed error reported by the provider.
    VendorError,
    /// Response body was not the shape the provider documents.
    MalformedResponse,
    /// The caller cancelled the call.
    Cancelled,
    /// The client could not be built from the given options.
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NetworkFailure => "network_failure",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::VendorError => "vendor_error",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Configuration => "configuration",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::NetworkFailure | ErrorKind::RateLimited)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error value returned by every client call that does not succeed.
///
/// Serializes as `{"error": true, "kind": ..., "message": ..., "details": ...}`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ClientError {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status and raw vendor payload, when there was one.
    pub details: Option<Value>,
}

impl ClientError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), details: None }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkFailure, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn vendor(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::VendorError, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Weather request was cancelled")
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl Serialize for ClientError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ClientError", 4)?;
        state.serialize_field("error", &true)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("details", &self.details)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_and_rate_limit_are_retryable() {
        assert!(ErrorKind::NetworkFailure.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::VendorError.is_retryable());
        assert!(!ErrorKind::MalformedResponse.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
        assert!(!ErrorKind::Configuration.is_retryable());
    }

    #[test]
    fn serializes_with_error_discriminator() {
        let err = ClientError::vendor("101 invalid_access_key")
            .with_details(serde_json::json!({ "status": 200 }));

        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["error"], true);
        assert_eq!(value["kind"], "vendor_error");
        assert_eq!(value["message"], "101 invalid_access_key");
        assert_eq!(value["details"]["status"], 200);
    }

    #[test]
    fn missing_details_serialize_as_null() {
        let value = serde_json::to_value(ClientError::cancelled()).unwrap();
        assert!(value.as_object().unwrap().contains_key("details"));
        assert!(value["details"].is_null());
    }
}
