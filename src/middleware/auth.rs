use axum::{
    Extension,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::error::AppError;
use crate::session::{CurrentIdentity, token_digest};

/// Resolves the bearer token to a `CurrentIdentity` (session cache first,
/// database on miss) and injects it as a request extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;
    let digest = token_digest(token);

    let identity = match state.sessions.get(&digest).await {
        Some(identity) => identity,
        None => state
            .sessions
            .refresh(&state.db, &digest)
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid bearer token".to_string()))?,
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Money-moving routes are only reachable by approved customers (admins
/// pass implicitly).
pub async fn require_approved(
    Extension(identity): Extension<CurrentIdentity>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !identity.is_approved() {
        return Err(AppError::Forbidden(
            "customer is not approved".to_string(),
        ));
    }
    Ok(next.run(req).await)
}

pub async fn require_admin(
    Extension(identity): Extension<CurrentIdentity>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !identity.is_admin() {
        return Err(AppError::Forbidden("admin role required".to_string()));
    }
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer mc_abc123"),
        );
        assert_eq!(bearer_token(&headers), Some("mc_abc123"));
    }

    #[test]
    fn rejects_non_bearer_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwdw=="),
        );
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn missing_header_yields_none() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
