//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use escrow::EscrowError;
use registry::RegistryError;

/// API error: an escrow-level outcome plus its HTTP rendering.
#[derive(Debug)]
pub struct ApiError(pub EscrowError);

/// Wire shape of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    /// 400 with a caller-facing message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self(EscrowError::InvalidArgument(message.into()))
    }

    /// 403.
    pub fn forbidden() -> Self {
        Self(EscrowError::Forbidden)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self.0 {
            EscrowError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
            EscrowError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            EscrowError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            EscrowError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            EscrowError::PreconditionFailed(_) => {
                (StatusCode::PRECONDITION_FAILED, "precondition_failed")
            }
            EscrowError::DepositUnverified(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "deposit_unverified")
            }
            EscrowError::InsufficientFunds => {
                (StatusCode::PAYMENT_REQUIRED, "insufficient_funds")
            }
            EscrowError::UpstreamFailure(_) => (StatusCode::BAD_GATEWAY, "upstream_failure"),
            EscrowError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }

        (
            status,
            Json(ErrorBody {
                error,
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<EscrowError> for ApiError {
    fn from(e: EscrowError) -> Self {
        Self(e)
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        Self(EscrowError::from(e))
    }
}
