use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::db::models::Account;
use crate::db::queries;
use crate::error::AppError;
use crate::session::CurrentIdentity;
use crate::validation::{ACCOUNT_NAME_MAX_LEN, validate_max_len, validate_required};

#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub name: String,
}

/// Accounts open in `pending`; an admin has to approve them before they
/// become debitable.
pub async fn open_account(
    State(state): State<AppState>,
    Extension(identity): Extension<CurrentIdentity>,
    Json(payload): Json<OpenAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_required("name", &payload.name)?;
    validate_max_len("name", &payload.name, ACCOUNT_NAME_MAX_LEN)?;

    // Account numbers are random; on the off chance of a collision the
    // unique index rejects the insert and we draw again.
    let mut last_err = None;
    for _ in 0..3 {
        let account = Account::new(
            identity.customer_id,
            payload.name.trim().to_string(),
            generate_account_number(),
        );

        match queries::insert_account(&state.db, &account).await {
            Ok(inserted) => {
                tracing::info!(
                    account_id = %inserted.id,
                    customer_id = %identity.customer_id,
                    "account opened"
                );
                return Ok((StatusCode::CREATED, Json(inserted)));
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                last_err = Some(sqlx::Error::Database(db));
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(last_err.map(AppError::Database).unwrap_or_else(|| {
        AppError::Internal("account number generation failed".to_string())
    }))
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(identity): Extension<CurrentIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let accounts = queries::list_accounts_for_customer(&state.db, identity.customer_id).await?;
    Ok(Json(accounts))
}

pub async fn get_account(
    State(state): State<AppState>,
    Extension(identity): Extension<CurrentIdentity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let account = queries::get_account(&state.db, id)
        .await?
        .filter(|account| account.customer_id == identity.customer_id || identity.is_admin())
        .ok_or_else(|| AppError::NotFound(format!("Account {}", id)))?;

    Ok(Json(account))
}

fn generate_account_number() -> String {
    let n = Uuid::new_v4().as_u128() % 10_000_000_000u128;
    format!("{:010}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_numbers_are_ten_digits() {
        for _ in 0..50 {
            let number = generate_account_number();
            assert_eq!(number.len(), 10);
            assert!(number.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
