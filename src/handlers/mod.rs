use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

use crate::AppState;
use crate::health::{PostgresChecker, check_health};

pub mod accounts;
pub mod admin;
pub mod deposits;
pub mod loans;
pub mod session;
pub mod transfers;

#[derive(Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let postgres = PostgresChecker::new(state.db.clone());
    let response = check_health(postgres, state.start_time).await;

    let status = if response.status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
