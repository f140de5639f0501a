use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use uuid::Uuid;

use crate::config::Config;

const MAX_BODY_LOG_SIZE: usize = 1024;

pub async fn request_logger_middleware(
    State(config): State<Config>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    // Propagate the request id to downstream handlers
    req.headers_mut()
        .insert("x-request-id", request_id.parse().unwrap());

    if config.log_request_body {
        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, MAX_BODY_LOG_SIZE).await {
            Ok(bytes) => bytes,
            Err(_) => {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    uri = %uri,
                    "Request body too large or failed to read"
                );
                return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
            }
        };

        let body_str = String::from_utf8_lossy(&bytes);
        let logged_body = if let Ok(json) = serde_json::from_str::<serde_json::Value>(&body_str) {
            let masked = crate::utils::sanitize::sanitize_json(&json);
            serde_json::to_string(&masked).unwrap_or_else(|_| "[invalid json]".to_string())
        } else {
            format!("[non-json, {} bytes]", bytes.len())
        };

        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            body_size = bytes.len(),
            body = %logged_body,
            "Incoming request"
        );

        req = Request::from_parts(parts, Body::from(bytes));
    } else {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            "Incoming request"
        );
    }

    let response = next.run(req).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = latency.as_millis(),
        "Outgoing response"
    );

    let (mut parts, body) = response.into_parts();
    parts
        .headers
        .insert("x-request-id", request_id.parse().unwrap());

    Response::from_parts(parts, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllowedIps;
    use axum::http::Request;
    use axum::{Router, routing::post};
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            server_port: 3000,
            database_url: "postgres://localhost/meridian".to_string(),
            session_ttl_secs: 86400,
            admin_allowed_ips: AllowedIps::Any,
            trusted_proxy_depth: 0,
            cors_allowed_origins: None,
            log_request_body: false,
        }
    }

    #[tokio::test]
    async fn test_request_logger_adds_request_id() {
        let app = Router::new()
            .route("/test", post(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                test_config(),
                request_logger_middleware,
            ));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().contains_key("x-request-id"));
    }
}
