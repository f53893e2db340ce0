use axum::{
    extract::Request,
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use atelier_types::api::Claims;

use crate::error::ApiError;

pub fn jwt_secret() -> String {
    std::env::var("ATELIER_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into())
}

/// Claims injected by `optional_auth`: `None` for anonymous requests.
#[derive(Debug, Clone)]
pub struct MaybeClaims(pub Option<Claims>);

/// Extract and validate the JWT from the Authorization header.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let claims = claims_from_headers(req.headers())?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Same extraction, but anonymous requests pass through.
pub async fn optional_auth(mut req: Request, next: Next) -> Response {
    let claims = claims_from_headers(req.headers()).ok();
    req.extensions_mut().insert(MaybeClaims(claims));
    next.run(req).await
}

fn claims_from_headers(headers: &HeaderMap) -> Result<Claims, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::authentication("missing bearer token"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::authentication("malformed authorization header"))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret().as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::authentication("invalid or expired token"))?;

    Ok(token_data.claims)
}
