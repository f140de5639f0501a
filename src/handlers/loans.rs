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
use crate::services::loan::NewLoan;
use crate::session::CurrentIdentity;

#[derive(Debug, Deserialize)]
pub struct LoanPayload {
    pub account_id: Uuid,
    pub principal: BigDecimal,
    pub annual_rate_bps: i32,
    pub term_months: i32,
    pub purpose: String,
}

pub async fn apply_loan(
    State(state): State<AppState>,
    Extension(identity): Extension<CurrentIdentity>,
    Json(payload): Json<LoanPayload>,
) -> Result<impl IntoResponse, AppError> {
    let loan = state
        .loans
        .apply(
            &identity,
            NewLoan {
                account_id: payload.account_id,
                principal: payload.principal,
                annual_rate_bps: payload.annual_rate_bps,
                term_months: payload.term_months,
                purpose: payload.purpose,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(loan)))
}

pub async fn list_loans(
    State(state): State<AppState>,
    Extension(identity): Extension<CurrentIdentity>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let loans = queries::list_loans_for_customer(
        &state.db,
        identity.customer_id,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;

    Ok(Json(loans))
}
