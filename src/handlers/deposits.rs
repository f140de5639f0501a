use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::db::queries;
use crate::error::AppError;
use crate::handlers::Pagination;
use crate::services::deposit::NewDeposit;
use crate::session::CurrentIdentity;

#[derive(Debug, Deserialize)]
pub struct DepositPayload {
    pub account_id: Uuid,
    pub amount: BigDecimal,
    pub reference: Option<String>,
}

pub async fn create_deposit(
    State(state): State<AppState>,
    Extension(identity): Extension<CurrentIdentity>,
    Json(payload): Json<DepositPayload>,
) -> Result<impl IntoResponse, AppError> {
    let deposit = state
        .deposits
        .request(
            &identity,
            NewDeposit {
                account_id: payload.account_id,
                amount: payload.amount,
                reference: payload.reference,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(deposit)))
}

pub async fn list_deposits(
    State(state): State<AppState>,
    Extension(identity): Extension<CurrentIdentity>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let deposits = queries::list_deposits_for_customer(
        &state.db,
        identity.customer_id,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;

    Ok(Json(deposits))
}
