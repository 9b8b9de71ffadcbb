use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

use crate::{config::Config, error::AppError, AppState};

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "barbershop_session";

/// A verified admin login, stored in request extensions by `require_admin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub email: String,
    pub expires_at: i64,
}

fn keyed(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

/// Checks a login attempt against the configured admin account.
pub fn check_credentials(config: &Config, email: &str, password: &str) -> bool {
    let email_ok = email.trim().eq_ignore_ascii_case(config.admin_email.trim());

    // Compare keyed digests so the password check runs in constant time
    let mut expected = keyed(&config.session_secret);
    expected.update(config.admin_password.as_bytes());
    let expected = expected.finalize().into_bytes();

    let mut supplied = keyed(&config.session_secret);
    supplied.update(password.as_bytes());
    let password_ok = supplied.verify_slice(&expected).is_ok();

    email_ok && password_ok
}

/// Token format: `hex(email|expires_at).hex(HMAC-SHA256(secret, email|expires_at))`.
pub fn issue_session(secret: &str, email: &str, expires_at: i64) -> String {
    let payload = format!("{}|{}", email, expires_at);
    let mut mac = keyed(secret);
    mac.update(payload.as_bytes());
    format!(
        "{}.{}",
        hex::encode(payload),
        hex::encode(mac.finalize().into_bytes())
    )
}

pub fn verify_session(token: &str, secret: &str, now: i64) -> Option<AdminSession> {
    let (payload_hex, signature_hex) = token.split_once('.')?;
    let payload = hex::decode(payload_hex).ok()?;
    let signature = hex::decode(signature_hex).ok()?;

    let mut mac = keyed(secret);
    mac.update(&payload);
    if mac.verify_slice(&signature).is_err() {
        tracing::warn!("Session signature mismatch");
        return None;
    }

    let payload = String::from_utf8(payload).ok()?;
    let (email, expires) = payload.rsplit_once('|')?;
    let expires_at: i64 = expires.parse().ok()?;
    if now >= expires_at {
        return None;
    }

    Some(AdminSession {
        email: email.to_string(),
        expires_at,
    })
}

/// Finds and verifies the session cookie among the request's `Cookie` headers.
pub fn session_from_headers(headers: &HeaderMap, secret: &str, now: i64) -> Option<AdminSession> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, token)| verify_session(token, secret, now))
}

pub fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}")
}

pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Axum middleware that rejects requests without a valid admin session.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let now = state.clock.timestamp();
    let session = session_from_headers(req.headers(), &state.config.session_secret, now)
        .ok_or(AppError::Unauthorized)?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}
