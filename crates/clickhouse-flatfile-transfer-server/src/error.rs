//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use clickhouse_flatfile_transfer::TransferError;

/// JSON error body returned by every failing endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Error kind, e.g. "ConversionError".
    pub error: String,

    /// Human-readable message, verbatim from the failure.
    pub message: String,

    /// Rows fully processed before a transfer failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_count: Option<u64>,
}

/// An error ready to be rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    /// A request-level problem outside the transfer error taxonomy.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: "ConfigError".to_string(),
                message: message.into(),
                record_count: None,
            },
        }
    }

    /// A failed transfer, preserving the partial record count.
    pub fn from_transfer(error: TransferError, record_count: u64) -> Self {
        let mut api = Self::from(error);
        api.body.record_count = Some(record_count);
        api
    }
}

impl From<TransferError> for ApiError {
    fn from(error: TransferError) -> Self {
        // Malformed input and configuration are the caller's fault; backend
        // and I/O failures are not.
        let status = match &error {
            TransferError::Config(_)
            | TransferError::Format { .. }
            | TransferError::Conversion { .. }
            | TransferError::Schema(_) => StatusCode::BAD_REQUEST,
            TransferError::Io(_)
            | TransferError::Query(_)
            | TransferError::Scan { .. }
            | TransferError::Batch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            body: ErrorBody {
                error: error.kind().to_string(),
                message: error.to_string(),
                record_count: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
