use axum::{
    extract::{Query, State},
    http::header,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    auth::{self, AdminSession},
    db::{self, AppointmentFilter},
    error::AppError,
    models::*,
    slot, AppState,
};

/// Dashboard shows this many upcoming appointments.
const UPCOMING_LIMIT: i64 = 5;

type WithCookie<T> = ([(header::HeaderName, String); 1], Json<ApiResponse<T>>);

/// POST /api/admin/login — check credentials and set the session cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<WithCookie<LoginResponse>, AppError> {
    if !auth::check_credentials(&state.config, &body.email, &body.password) {
        tracing::warn!("Failed admin login for {}", body.email.trim());
        return Err(AppError::InvalidCredentials);
    }

    let email = state.config.admin_email.clone();
    let ttl = state.config.session_ttl_secs;
    let expires_at = state.clock.timestamp() + ttl;
    let token = auth::issue_session(&state.config.session_secret, &email, expires_at);

    tracing::info!("Admin {} logged in", email);

    Ok((
        [(header::SET_COOKIE, auth::session_cookie(&token, ttl))],
        Json(ApiResponse::success(LoginResponse { email, expires_at })),
    ))
}

/// POST /api/admin/logout — clear the session cookie.
pub async fn logout() -> WithCookie<()> {
    (
        [(header::SET_COOKIE, auth::expired_session_cookie())],
        Json(ApiResponse::success(())),
    )
}

/// GET /api/admin/session — who is logged in and until when.
pub async fn session(Extension(session): Extension<AdminSession>) -> Json<ApiResponse<LoginResponse>> {
    Json(ApiResponse::success(LoginResponse {
        email: session.email,
        expires_at: session.expires_at,
    }))
}

/// GET /api/admin/appointments?date= | ?from=&to= — appointment listing.
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AdminSession>,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<ApiResponse<Vec<Appointment>>>, AppError> {
    let filter = appointment_filter(&query)?;
    let appointments = db::list_appointments(&state.db, filter).await?;

    tracing::debug!(
        "Admin {} listed {} appointments",
        session.email,
        appointments.len()
    );

    Ok(Json(ApiResponse::success(appointments)))
}

/// GET /api/admin/summary — dashboard totals and the next appointments.
pub async fn summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<AdminSummary>>, AppError> {
    let total_appointments = db::count_appointments(&state.db).await?;
    let total_customers = db::count_customers(&state.db).await?;
    let today = state.clock.now().date();
    let upcoming = db::upcoming_appointments(&state.db, today, UPCOMING_LIMIT).await?;

    Ok(Json(ApiResponse::success(AdminSummary {
        total_appointments,
        total_customers,
        upcoming,
    })))
}

fn appointment_filter(query: &AppointmentsQuery) -> Result<AppointmentFilter, AppError> {
    let date = |field: &str, raw: &str| {
        slot::parse_date(raw)
            .ok_or_else(|| AppError::BadRequest(format!("{} must be YYYY-MM-DD", field)))
    };

    match (&query.date, &query.from, &query.to) {
        (None, None, None) => Ok(AppointmentFilter::All),
        (Some(day), None, None) => Ok(AppointmentFilter::On(date("date", day)?)),
        (None, Some(from), Some(to)) => {
            let from = date("from", from)?;
            let to = date("to", to)?;
            if from > to {
                return Err(AppError::BadRequest("from must not be after to".into()));
            }
            Ok(AppointmentFilter::Between(from, to))
        }
        _ => Err(AppError::BadRequest(
            "Use either date, or from and to together".into(),
        )),
    }
}
