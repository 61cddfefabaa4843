use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use token_types::errors::LedgerError;

/// Central error type for the gateway.
///
/// Every failure is reported as a `LedgerError` so the HTTP client can map it
/// back to the same variant it would get in-process.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct AppError(#[from] pub LedgerError);

impl AppError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self(LedgerError::MalformedInstruction(reason.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LedgerError::Transport(_) => StatusCode::BAD_GATEWAY,
            LedgerError::SigningRejected(_) | LedgerError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            LedgerError::Unauthorized(_) => StatusCode::FORBIDDEN,
            LedgerError::NonceReplay { .. } | LedgerError::StaleMessage => StatusCode::CONFLICT,
            LedgerError::MalformedInstruction(_)
            | LedgerError::UnsupportedDecimals(_)
            | LedgerError::RegistryMismatch => StatusCode::BAD_REQUEST,
            LedgerError::RegistryNotFound { .. } | LedgerError::AccountNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            LedgerError::InsufficientFunds { .. } | LedgerError::Overflow => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            LedgerError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "ledger request failed");
        } else {
            tracing::debug!(error = %self.0, %status, "ledger request rejected");
        }

        let body = Json(json!({
            "error": self.0,
            "message": self.0.to_string(),
        }));

        (status, body).into_response()
    }
}
