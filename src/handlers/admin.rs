use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::AppState;
use crate::db::models::{
    ACCOUNT_ACTIVE, ACCOUNT_CLOSED, ACCOUNT_FROZEN, ACCOUNT_PENDING, APPROVAL_APPROVED,
    APPROVAL_PENDING, APPROVAL_REJECTED, STATUS_PENDING,
};
use crate::db::queries;
use crate::error::AppError;
use crate::handlers::Pagination;
use crate::session::CurrentIdentity;

#[derive(Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl StatusFilter {
    fn pagination(&self) -> Pagination {
        Pagination {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

// --- Customer approval ---

pub async fn list_customers(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> Result<impl IntoResponse, AppError> {
    let status = filter.status.as_deref().unwrap_or(APPROVAL_PENDING);
    let customers = queries::list_customers_by_approval(
        &state.db,
        status,
        filter.pagination().limit(),
        filter.pagination().offset(),
    )
    .await?;

    Ok(Json(customers))
}

pub async fn approve_customer(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    decide_customer(&state, &admin, id, APPROVAL_APPROVED).await
}

pub async fn reject_customer(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    decide_customer(&state, &admin, id, APPROVAL_REJECTED).await
}

async fn decide_customer(
    state: &AppState,
    admin: &CurrentIdentity,
    id: Uuid,
    new_status: &str,
) -> Result<Json<crate::db::models::Customer>, AppError> {
    let mut tx = state.db.begin().await?;

    let updated =
        queries::update_customer_approval(&mut tx, id, new_status, &admin.customer_id.to_string())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Customer {}", id)))?;

    tx.commit().await?;

    tracing::info!(customer_id = %id, status = new_status, "customer approval updated");
    Ok(Json(updated))
}

// --- Account administration ---

pub async fn approve_account(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    transition_account(&state, &admin, id, &[ACCOUNT_PENDING], ACCOUNT_ACTIVE).await
}

pub async fn freeze_account(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    transition_account(&state, &admin, id, &[ACCOUNT_ACTIVE], ACCOUNT_FROZEN).await
}

pub async fn unfreeze_account(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    transition_account(&state, &admin, id, &[ACCOUNT_FROZEN], ACCOUNT_ACTIVE).await
}

pub async fn close_account(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    transition_account(
        &state,
        &admin,
        id,
        &[ACCOUNT_PENDING, ACCOUNT_ACTIVE, ACCOUNT_FROZEN],
        ACCOUNT_CLOSED,
    )
    .await
}

async fn transition_account(
    state: &AppState,
    admin: &CurrentIdentity,
    id: Uuid,
    allowed_from: &[&str],
    to_status: &str,
) -> Result<Json<crate::db::models::Account>, AppError> {
    let mut tx = state.db.begin().await?;

    let locked = queries::lock_accounts(&mut tx, &[id]).await?;
    let account = locked
        .first()
        .ok_or_else(|| AppError::NotFound(format!("Account {}", id)))?;

    if !allowed_from.contains(&account.status.as_str()) {
        return Err(AppError::Validation(format!(
            "account is {}, cannot move to {}",
            account.status, to_status
        )));
    }
    if to_status == ACCOUNT_CLOSED && account.balance != BigDecimal::from(0) {
        return Err(AppError::Validation(
            "account balance must be zero before closing".to_string(),
        ));
    }

    let updated = queries::update_account_status(
        &mut tx,
        id,
        to_status,
        &admin.customer_id.to_string(),
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Account {}", id)))?;

    tx.commit().await?;

    tracing::info!(account_id = %id, status = to_status, "account status updated");
    Ok(Json(updated))
}

// --- Deposit validation ---

pub async fn list_deposits(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> Result<impl IntoResponse, AppError> {
    let status = filter.status.as_deref().unwrap_or(STATUS_PENDING);
    let deposits = queries::list_deposits_by_status(
        &state.db,
        status,
        filter.pagination().limit(),
        filter.pagination().offset(),
    )
    .await?;

    Ok(Json(deposits))
}

pub async fn approve_deposit(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let deposit = state.deposits.approve(&admin, id).await?;
    Ok(Json(deposit))
}

pub async fn reject_deposit(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let deposit = state.deposits.reject(&admin, id).await?;
    Ok(Json(deposit))
}

// --- Loan validation ---

pub async fn list_loans(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> Result<impl IntoResponse, AppError> {
    let status = filter.status.as_deref().unwrap_or(STATUS_PENDING);
    let loans = queries::list_loans_by_status(
        &state.db,
        status,
        filter.pagination().limit(),
        filter.pagination().offset(),
    )
    .await?;

    Ok(Json(loans))
}

pub async fn approve_loan(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let loan = state.loans.approve(&admin, id).await?;
    Ok(Json(loan))
}

pub async fn reject_loan(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let loan = state.loans.reject(&admin, id).await?;
    Ok(Json(loan))
}

// --- Settlements ---

pub async fn run_settlements(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let settlement = state.settlements.run().await?;
    Ok(Json(json!({ "settlement": settlement })))
}

pub async fn list_settlements(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let settlements =
        queries::list_settlements(&state.db, pagination.limit(), pagination.offset()).await?;

    Ok(Json(settlements))
}

pub async fn get_settlement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let settlement = queries::get_settlement(&state.db, id).await.map_err(|e| match e {
        sqlx::Error::RowNotFound => AppError::NotFound(format!("Settlement {} not found", id)),
        _ => AppError::Database(e),
    })?;

    Ok(Json(settlement))
}

// --- Audit & reporting ---

pub async fn get_audit_logs(
    State(state): State<AppState>,
    Path(entity_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let entries = queries::get_audit_logs(
        &state.db,
        entity_id,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;

    Ok(Json(entries))
}

pub async fn transaction_report(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let status_counts = queries::get_transaction_status_counts(&state.db).await?;
    let totals_by_kind = queries::get_transaction_totals_by_kind(&state.db).await?;

    let totals: serde_json::Map<String, serde_json::Value> = totals_by_kind
        .into_iter()
        .map(|(kind, total)| (kind, json!(total.to_string())))
        .collect();

    Ok(Json(json!({
        "status_counts": status_counts,
        "totals_by_kind": totals,
    })))
}
