pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod services;
pub mod session;
pub mod utils;
pub mod validation;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::middleware::auth::{auth_middleware, require_admin, require_approved};
use crate::middleware::ip_filter::IpFilterLayer;
use crate::middleware::request_logger::request_logger_middleware;
use crate::services::deposit::DepositService;
use crate::services::loan::LoanService;
use crate::services::settlement::SettlementService;
use crate::services::transfer::TransferService;
use crate::session::SessionCache;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Config,
    pub sessions: Arc<SessionCache>,
    pub transfers: TransferService,
    pub deposits: DepositService,
    pub loans: LoanService,
    pub settlements: SettlementService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(db: sqlx::PgPool, config: Config) -> Self {
        let sessions = SessionCache::new(Duration::from_secs(config.session_ttl_secs));
        Self {
            transfers: TransferService::new(db.clone()),
            deposits: DepositService::new(db.clone()),
            loans: LoanService::new(db.clone()),
            settlements: SettlementService::new(db.clone()),
            sessions,
            db,
            config,
            start_time: Instant::now(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/register", post(handlers::session::register));

    // Session management only needs a resolvable identity, not approval:
    // pending customers refresh here after the back office approves them.
    let session_routes = Router::new()
        .route("/session/refresh", post(handlers::session::refresh))
        .route("/session/logout", post(handlers::session::logout))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let customer_routes = Router::new()
        .route(
            "/accounts",
            get(handlers::accounts::list_accounts).post(handlers::accounts::open_account),
        )
        .route("/accounts/:id", get(handlers::accounts::get_account))
        .route("/transfers", post(handlers::transfers::create_transfer))
        .route("/transfers/:id", get(handlers::transfers::get_transfer))
        .route("/transactions", get(handlers::transfers::list_transactions))
        .route(
            "/deposits",
            get(handlers::deposits::list_deposits).post(handlers::deposits::create_deposit),
        )
        .route(
            "/loans",
            get(handlers::loans::list_loans).post(handlers::loans::apply_loan),
        )
        .layer(axum::middleware::from_fn(require_approved))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/admin/customers", get(handlers::admin::list_customers))
        .route(
            "/admin/customers/:id/approve",
            post(handlers::admin::approve_customer),
        )
        .route(
            "/admin/customers/:id/reject",
            post(handlers::admin::reject_customer),
        )
        .route(
            "/admin/accounts/:id/approve",
            post(handlers::admin::approve_account),
        )
        .route(
            "/admin/accounts/:id/freeze",
            post(handlers::admin::freeze_account),
        )
        .route(
            "/admin/accounts/:id/unfreeze",
            post(handlers::admin::unfreeze_account),
        )
        .route(
            "/admin/accounts/:id/close",
            post(handlers::admin::close_account),
        )
        .route("/admin/deposits", get(handlers::admin::list_deposits))
        .route(
            "/admin/deposits/:id/approve",
            post(handlers::admin::approve_deposit),
        )
        .route(
            "/admin/deposits/:id/reject",
            post(handlers::admin::reject_deposit),
        )
        .route("/admin/loans", get(handlers::admin::list_loans))
        .route("/admin/loans/:id/approve", post(handlers::admin::approve_loan))
        .route("/admin/loans/:id/reject", post(handlers::admin::reject_loan))
        .route(
            "/admin/settlements/run",
            post(handlers::admin::run_settlements),
        )
        .route("/admin/settlements", get(handlers::admin::list_settlements))
        .route(
            "/admin/settlements/:id",
            get(handlers::admin::get_settlement),
        )
        .route(
            "/admin/audit/:entity_id",
            get(handlers::admin::get_audit_logs),
        )
        .route(
            "/admin/reports/transactions",
            get(handlers::admin::transaction_report),
        )
        .layer(axum::middleware::from_fn(require_admin))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(IpFilterLayer::new(
            state.config.admin_allowed_ips.clone(),
            state.config.trusted_proxy_depth,
        ));

    Router::new()
        .merge(public)
        .merge(session_routes)
        .merge(customer_routes)
        .merge(admin_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.config.clone(),
            request_logger_middleware,
        ))
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    match &config.cors_allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::new(),
    }
}
