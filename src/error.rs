use thiserror::Error;

/// Failures surfaced by a single analysis call. None of them are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("no API credential found in the secrets file or app metadata")]
    MissingCredential,

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("response had no body")]
    NoResponseBody,

    #[error("unexpected response envelope: {0}")]
    MalformedEnvelope(String),

    #[error("response did not match the analysis schema: {message}")]
    SchemaMismatch { message: String, raw: String },

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("image could not be encoded: {0}")]
    ImageEncodingFailure(String),

    #[error("no product found for barcode {0}")]
    ProductNotFound(String),
}

impl GatewayError {
    /// Stable snake_case identifier, used in logs and by callers mapping errors to messages.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::MissingCredential => "missing_credential",
            GatewayError::InvalidEndpoint(_) => "invalid_endpoint",
            GatewayError::NoResponseBody => "no_response_body",
            GatewayError::MalformedEnvelope(_) => "malformed_envelope",
            GatewayError::SchemaMismatch { .. } => "schema_mismatch",
            GatewayError::TransportFailure(_) => "transport_failure",
            GatewayError::ImageEncodingFailure(_) => "image_encoding_failure",
            GatewayError::ProductNotFound(_) => "product_not_found",
        }
    }

    /// The cleaned model output attached to a schema mismatch.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            GatewayError::SchemaMismatch { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::TransportFailure(format!("request timed out: {}", err))
        } else if err.is_builder() {
            GatewayError::InvalidEndpoint(err.to_string())
        } else {
            GatewayError::TransportFailure(err.to_string())
        }
    }
}
