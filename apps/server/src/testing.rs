//! Shared fixtures for unit tests.

use axum::{body::Body, http::Request, response::Response};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::sync::Arc;

use crate::{clock::FixedClock, config::Config, db, AppState};

pub const ADMIN_EMAIL: &str = "admin@barbershop.local";
pub const ADMIN_PASSWORD: &str = "s3cret";

/// Single-connection in-memory database with migrations applied.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

pub fn at(date: &str, time: &str) -> NaiveDateTime {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    let time = NaiveTime::parse_from_str(time, "%H:%M").unwrap();
    date.and_time(time)
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "ADMIN_EMAIL" => Some(ADMIN_EMAIL.into()),
        "ADMIN_PASSWORD" => Some(ADMIN_PASSWORD.into()),
        "SESSION_SECRET" => Some("test-session-secret".into()),
        _ => None,
    })
    .unwrap()
}

pub async fn test_state(now: NaiveDateTime) -> Arc<AppState> {
    Arc::new(AppState::new(
        memory_pool().await,
        test_config(),
        Arc::new(FixedClock(now)),
    ))
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
