use crate::error::AppError;
use crate::state::AppState;
use axum::{Json, extract::State, extract::rejection::JsonRejection};
use token_types::errors::LedgerError;
use token_types::ids::Identity;
use token_types::ledger::TxOutcome;
use wallet_core::signing::{verify_signature, SignedMessage};

pub async fn submit_transaction(
    State(state): State<AppState>,
    payload: Result<Json<SignedMessage>, JsonRejection>,
) -> Result<Json<TxOutcome>, AppError> {
    let Json(signed) = payload.map_err(|e| AppError::malformed(e.body_text()))?;

    // 1. Only a verified signer is charged against the rate limit
    let signer: Identity = verify_signature(&signed).map_err(|e| {
        tracing::debug!(error = %e, "rejecting unverifiable transaction");
        AppError(LedgerError::InvalidSignature)
    })?;
    state.rate_limiter.check(&signer)?;

    // 2. Execute
    let outcome = state.ledger.submit(&signed).await?;
    tracing::info!(
        %signer,
        action = %signed.message.action,
        receipt = %outcome.receipt(),
        "transaction accepted"
    );
    Ok(Json(outcome))
}
