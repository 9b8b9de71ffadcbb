use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::{
    booking::{self, BookingError},
    db,
    error::AppError,
    models::*,
    slot::{self, RejectionReason},
    AppState,
};

/// GET /api/services — active service catalog for the booking form.
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Service>>>, AppError> {
    let services = db::list_active_services(&state.db).await?;
    Ok(Json(ApiResponse::success(services)))
}

/// GET /api/available-times?date=YYYY-MM-DD — start times still bookable on a date.
pub async fn available_times(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailableTimesQuery>,
) -> Result<Json<ApiResponse<AvailableTimesResponse>>, AppError> {
    let date = slot::parse_date(&query.date).ok_or(RejectionReason::InvalidDateTime)?;
    let booked = db::appointments_on(&state.db, date).await?;

    let times = state
        .schedule
        .free_starts(date, &booked, state.clock.now())
        .into_iter()
        .map(|free| TimeBlock {
            start_time: slot::format_time(free.start),
            end_time: slot::format_time(free.end),
        })
        .collect();

    Ok(Json(ApiResponse::success(AvailableTimesResponse {
        date,
        times,
    })))
}

/// POST /api/appointments — submit the booking form.
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AppointmentSubmission>,
) -> Result<Json<ApiResponse<Appointment>>, AppError> {
    match booking::book(&state.booking_context(), &body).await {
        Ok(appointment) => Ok(Json(ApiResponse::success(appointment))),
        Err(BookingError::Rejected(reason)) => {
            tracing::info!(
                "Booking rejected ({}): {} {}",
                reason.code(),
                body.date,
                body.time
            );
            Err(reason.into())
        }
        Err(e) => Err(e.into()),
    }
}
