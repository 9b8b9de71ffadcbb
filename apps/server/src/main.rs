mod auth;
mod booking;
mod clock;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod rate_limit;
mod slot;

#[cfg(test)]
mod testing;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use booking::{BookingContext, DateLocks};
use clock::{Clock, SystemClock};
use config::Config;
use rate_limit::{RateLimiter, Tier};
use slot::Schedule;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub schedule: Schedule,
    pub clock: Arc<dyn Clock>,
    pub date_locks: DateLocks,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, config: Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            schedule: config.schedule(),
            config,
            clock,
            date_locks: DateLocks::new(),
            started_at: Instant::now(),
        }
    }

    pub fn booking_context(&self) -> BookingContext<'_> {
        BookingContext {
            db: &self.db,
            locks: &self.date_locks,
            schedule: &self.schedule,
            clock: self.clock.as_ref(),
        }
    }
}

/// Rate limit cleanup interval (seconds).
const RATE_LIMIT_CLEANUP_SECS: u64 = 300;
/// Idle per-date lock pruning interval (seconds).
const DATE_LOCK_PRUNE_SECS: u64 = 600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        "Bookings open {:02}:00, last start {:02}:xx, Monday to Friday",
        config.open_hour,
        config.last_start_hour
    );

    // ── Database ──
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    db::run_migrations(&pool).await?;

    let cors = cors_layer(config.cors_origin.as_deref())?;
    let addr = config.bind_addr();
    let state = Arc::new(AppState::new(pool, config, Arc::new(SystemClock)));

    // ── Rate limiter ──
    let rate_limiter = RateLimiter::with_defaults();

    // ── Background tasks: stale rate limit entries, idle date locks ──
    let cleanup_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(RATE_LIMIT_CLEANUP_SECS));
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup();
        }
    });

    let prune_locks = state.date_locks.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(DATE_LOCK_PRUNE_SECS));
        loop {
            interval.tick().await;
            prune_locks.prune();
        }
    });

    let app = router(state, &rate_limiter).layer(cors);

    tracing::info!("Barbershop server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Builds the route table, one group per rate limit tier.
fn router(state: Arc<AppState>, limiter: &RateLimiter) -> Router {
    // 1. No limit: health checks, logout
    let no_limit_routes = Router::new()
        .route("/api/health", get(handlers::health::health))
        .route("/api/admin/logout", post(handlers::admin::logout));

    // 2. Public booking view (read-only)
    let public_routes = Router::new()
        .route("/api/services", get(handlers::client::list_services))
        .route(
            "/api/available-times",
            get(handlers::client::available_times),
        )
        .layer(from_fn_with_state(
            limiter.guard(Tier::Public),
            rate_limit::enforce,
        ));

    // 3. Appointment submission: strictest limit
    let booking_routes = Router::new()
        .route(
            "/api/appointments",
            post(handlers::client::create_appointment),
        )
        .layer(from_fn_with_state(
            limiter.guard(Tier::Booking),
            rate_limit::enforce,
        ));

    // 4. Admin login
    let login_routes = Router::new()
        .route("/api/admin/login", post(handlers::admin::login))
        .layer(from_fn_with_state(
            limiter.guard(Tier::Login),
            rate_limit::enforce,
        ));

    // 5. Admin views: session required
    let admin_routes = Router::new()
        .route(
            "/api/admin/appointments",
            get(handlers::admin::list_appointments),
        )
        .route("/api/admin/summary", get(handlers::admin::summary))
        .route("/api/admin/session", get(handlers::admin::session))
        .route_layer(from_fn_with_state(state.clone(), auth::require_admin))
        .layer(from_fn_with_state(
            limiter.guard(Tier::Admin),
            rate_limit::enforce,
        ));

    Router::new()
        .merge(no_limit_routes)
        .merge(public_routes)
        .merge(booking_routes)
        .merge(login_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Restrict CORS to CORS_ORIGIN (with cookies) when set, otherwise allow any origin.
fn cors_layer(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let cors = match origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin.parse::<HeaderValue>()?))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };
    Ok(cors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_accepts_origin() {
        assert!(cors_layer(None).is_ok());
        assert!(cors_layer(Some("https://barbershop.test")).is_ok());
        assert!(cors_layer(Some("bad\norigin")).is_err());
    }
}
