use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use std::str::FromStr;
use token_types::ids::{HoldingAccountId, Identity, RegistryId};
use token_types::ledger::{HoldingAccount, RegistryState};

fn parse_id<T: FromStr>(kind: &str, raw: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|_| AppError::malformed(format!("invalid {kind} address: {raw:?}")))
}

pub async fn get_registry(
    State(state): State<AppState>,
    Path(registry): Path<String>,
) -> Result<Json<RegistryState>, AppError> {
    let registry: RegistryId = parse_id("registry", &registry)?;
    Ok(Json(state.ledger.registry(&registry).await?))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<HoldingAccount>, AppError> {
    let account: HoldingAccountId = parse_id("account", &account)?;
    Ok(Json(state.ledger.account(&account).await?))
}

pub async fn get_holder(
    State(state): State<AppState>,
    Path((registry, owner)): Path<(String, String)>,
) -> Result<Json<HoldingAccount>, AppError> {
    let registry: RegistryId = parse_id("registry", &registry)?;
    let owner: Identity = parse_id("owner", &owner)?;
    Ok(Json(state.ledger.holding_account_of(&registry, &owner).await?))
}
