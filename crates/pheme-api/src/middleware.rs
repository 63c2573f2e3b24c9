use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode};

use pheme_types::UserId;
use pheme_types::api::Claims;

use crate::AppState;

/// Resolved request identity: the numeric user id carried in the `jwt`
/// cookie.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

/// Extract and validate the JWT from the `jwt` cookie. The auth service mints
/// the token with the user id in the standard issuer claim; once the
/// signature and expiry check out, that identity is trusted downstream.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let cookie = jar.get("jwt").ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        cookie.value(),
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let user_id: UserId = token_data
        .claims
        .iss
        .parse()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(req).await)
}
