use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::{error::AuthError, state::AppState, types::UserId};

/// Authenticated caller identity, inserted as a request extension by the
/// gate for downstream handlers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: UserId,
}

/// Access-control gate for protected routes: verifies the bearer credential
/// (expiry enforced) and checks the denylist, failing closed when the
/// denylist is unavailable.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(request.headers()).ok_or_else(|| {
        AuthError::Authentication("Access credential required".to_string())
    })?;

    let user_id = state.auth.check_authenticated(&token).await?;
    request.extensions_mut().insert(AuthContext { user_id });

    Ok(next.run(request).await)
}

pub fn bearer_token(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .map(|value| value.to_string())
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    if let Some(rest) = header.strip_prefix("Bearer ") {
        return Some(rest);
    }
    if let Some(space_idx) = header.find(' ') {
        let (scheme, rest) = header.split_at(space_idx);
        if scheme.eq_ignore_ascii_case("bearer") {
            return Some(rest.trim_start());
        }
    }
    None
}
