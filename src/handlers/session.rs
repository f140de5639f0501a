use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::db::models::Customer;
use crate::db::queries;
use crate::error::AppError;
use crate::session::{CurrentIdentity, generate_token, token_digest};
use crate::validation::{validate_email, validate_max_len, validate_required};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
}

/// Self-service signup. The customer lands in `pending` and cannot move
/// money until the back office approves them. The API token is returned
/// exactly once; only its digest is stored.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_required("full_name", &payload.full_name)?;
    validate_max_len("full_name", &payload.full_name, 100)?;
    validate_email(&payload.email)?;

    let token = generate_token();
    let customer = Customer::new(
        payload.full_name.trim().to_string(),
        payload.email.trim().to_lowercase(),
        token_digest(&token),
    );

    let inserted = queries::insert_customer(&state.db, &customer)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Validation("email is already registered".to_string())
            }
            _ => AppError::Database(e),
        })?;

    tracing::info!(customer_id = %inserted.id, "customer registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "customer_id": inserted.id,
            "approval_status": inserted.approval_status,
            "api_token": token,
        })),
    ))
}

/// Imperative re-resolution of the cached identity, e.g. after the back
/// office approved the customer.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let digest = digest_from_headers(&headers)?;

    let identity = state
        .sessions
        .refresh(&state.db, &digest)
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid bearer token".to_string()))?;

    Ok(Json(identity))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(_identity): Extension<CurrentIdentity>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let digest = digest_from_headers(&headers)?;
    state.sessions.expire(&digest).await;

    Ok(StatusCode::NO_CONTENT)
}

fn digest_from_headers(headers: &HeaderMap) -> Result<String, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

    Ok(token_digest(token))
}
