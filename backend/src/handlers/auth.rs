use axum::{
    extract::{Path, State},
    http::{
        header::{COOKIE, SET_COOKIE, USER_AGENT},
        HeaderMap,
    },
    response::AppendHeaders,
    Extension, Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::{
    config::Config,
    error::AuthError,
    middleware::auth::{bearer_token, AuthContext},
    state::AppState,
    types::UserId,
    utils::cookies::{
        build_auth_cookie, build_clear_cookie, extract_cookie_value, CookieOptions,
        REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH,
    },
};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

impl SessionResponse {
    fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer",
        }
    }
}

type SetCookie = AppendHeaders<[(axum::http::HeaderName, String); 1]>;

pub async fn new_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<(SetCookie, Json<SessionResponse>), AuthError> {
    let user_id: UserId = user_id
        .parse()
        .map_err(|_| AuthError::Validation("Invalid user ID format".to_string()))?;

    let fingerprint = origin_fingerprint(&headers)?;
    let network = origin_network(&headers)?;

    let tokens = state
        .auth
        .new_session(user_id, &fingerprint, &network)
        .await?;

    Ok((
        set_refresh_cookie(&state.config, &tokens.refresh_secret),
        Json(SessionResponse::bearer(tokens.access_token)),
    ))
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(SetCookie, Json<SessionResponse>), AuthError> {
    let access_token = require_bearer(&headers)?;
    let refresh_secret = require_refresh_cookie(&headers)?;
    let fingerprint = origin_fingerprint(&headers)?;
    let network = origin_network(&headers)?;

    let tokens = state
        .auth
        .refresh(&access_token, &refresh_secret, &fingerprint, &network)
        .await?;

    Ok((
        set_refresh_cookie(&state.config, &tokens.refresh_secret),
        Json(SessionResponse::bearer(tokens.access_token)),
    ))
}

pub async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(SetCookie, Json<Value>), AuthError> {
    let access_token = require_bearer(&headers)?;
    let refresh_secret = require_refresh_cookie(&headers)?;

    state.auth.revoke(&access_token, &refresh_secret).await?;

    let cookie = build_clear_cookie(
        REFRESH_COOKIE_NAME,
        REFRESH_COOKIE_PATH,
        cookie_options(&state.config),
    );
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(json!({ "message": "Session revoked" })),
    ))
}

pub async fn me(Extension(ctx): Extension<AuthContext>) -> Json<Value> {
    Json(json!({ "user_id": ctx.user_id }))
}

fn require_bearer(headers: &HeaderMap) -> Result<String, AuthError> {
    bearer_token(headers)
        .ok_or_else(|| AuthError::Authentication("Access credential required".to_string()))
}

fn require_refresh_cookie(headers: &HeaderMap) -> Result<String, AuthError> {
    headers
        .get(COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| extract_cookie_value(raw, REFRESH_COOKIE_NAME))
        .ok_or_else(|| AuthError::Authentication("Refresh secret required".to_string()))
}

fn origin_fingerprint(headers: &HeaderMap) -> Result<String, AuthError> {
    header_value(headers, USER_AGENT.as_str())
        .ok_or_else(|| AuthError::Authentication("Origin fingerprint required".to_string()))
}

fn origin_network(headers: &HeaderMap) -> Result<String, AuthError> {
    header_value(headers, "x-forwarded-for")
        .ok_or_else(|| AuthError::Authentication("Origin network required".to_string()))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

fn set_refresh_cookie(config: &Config, refresh_secret: &str) -> SetCookie {
    let cookie = build_auth_cookie(
        REFRESH_COOKIE_NAME,
        refresh_secret,
        Duration::from_secs(config.refresh_cookie_ttl_days * 24 * 60 * 60),
        REFRESH_COOKIE_PATH,
        cookie_options(config),
    );
    AppendHeaders([(SET_COOKIE, cookie)])
}

fn cookie_options(config: &Config) -> CookieOptions {
    CookieOptions {
        secure: config.cookie_secure,
        same_site: config.cookie_same_site,
    }
}
