use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::db::queries;
use crate::error::AppError;
use crate::handlers::Pagination;
use crate::services::transfer::NewTransfer;
use crate::session::CurrentIdentity;

#[derive(Debug, Deserialize)]
pub struct TransferPayload {
    pub from_account_id: Uuid,
    pub kind: String,
    pub to_account_number: String,
    pub recipient_name: Option<String>,
    pub amount: BigDecimal,
    pub description: Option<String>,
}

pub async fn create_transfer(
    State(state): State<AppState>,
    Extension(identity): Extension<CurrentIdentity>,
    headers: HeaderMap,
    Json(payload): Json<TransferPayload>,
) -> Result<impl IntoResponse, AppError> {
    let idempotency_key = match headers.get("x-idempotency-key") {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| AppError::Validation("invalid idempotency key".to_string()))?
                .to_string(),
        ),
        None => None,
    };

    let transfer = state
        .transfers
        .execute(
            &identity,
            NewTransfer {
                from_account_id: payload.from_account_id,
                kind: payload.kind,
                to_account_number: payload.to_account_number,
                recipient_name: payload.recipient_name,
                amount: payload.amount,
                description: payload.description,
                idempotency_key,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(transfer)))
}

pub async fn get_transfer(
    State(state): State<AppState>,
    Extension(identity): Extension<CurrentIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let transfer = queries::get_transfer(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transfer {}", id)))?;

    let source = queries::get_account(&state.db, transfer.from_account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transfer {}", id)))?;
    if source.customer_id != identity.customer_id && !identity.is_admin() {
        // Hide the existence of other customers' transfers
        return Err(AppError::NotFound(format!("Transfer {}", id)));
    }

    Ok(Json(transfer))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(identity): Extension<CurrentIdentity>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let transactions = queries::list_transactions_for_customer(
        &state.db,
        identity.customer_id,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;

    Ok(Json(transactions))
}
