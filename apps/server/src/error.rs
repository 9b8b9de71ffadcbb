use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::booking::BookingError;
use crate::models::ApiResponse;
use crate::slot::RejectionReason;

/// Everything a handler can fail with.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Admin login required")]
    Unauthorized,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<RejectionReason> for AppError {
    fn from(reason: RejectionReason) -> Self {
        Self::Booking(BookingError::Rejected(reason))
    }
}

fn rejection_status(reason: RejectionReason) -> StatusCode {
    match reason {
        RejectionReason::InvalidDateTime => StatusCode::BAD_REQUEST,
        RejectionReason::PastDateTime
        | RejectionReason::LunchBreak
        | RejectionReason::OutsideBusinessHours => StatusCode::UNPROCESSABLE_ENTITY,
        RejectionReason::SlotConflict => StatusCode::CONFLICT,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Booking(BookingError::Rejected(reason)) => (
                rejection_status(*reason),
                ApiResponse::<()>::error(reason.to_string()).with_code(reason.code()),
            ),
            AppError::Booking(BookingError::MissingField(_)) => (
                StatusCode::BAD_REQUEST,
                ApiResponse::error(self.to_string()).with_code("missing_field"),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiResponse::error(msg.clone())),
            AppError::InvalidCredentials | AppError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, ApiResponse::error(self.to_string()))
            }
            AppError::Booking(BookingError::Storage(e)) | AppError::Database(e) => {
                tracing::error!("Storage failure: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, ApiResponse::error("DB error"))
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_statuses() {
        let status = |r: RejectionReason| AppError::from(r).into_response().status();
        assert_eq!(status(RejectionReason::InvalidDateTime), StatusCode::BAD_REQUEST);
        assert_eq!(status(RejectionReason::PastDateTime), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status(RejectionReason::LunchBreak), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status(RejectionReason::OutsideBusinessHours),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status(RejectionReason::SlotConflict), StatusCode::CONFLICT);
    }

    #[test]
    fn test_storage_errors_are_not_rejections() {
        let err = AppError::from(BookingError::Storage(sqlx::Error::PoolTimedOut));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_missing_field_is_bad_request() {
        let err = AppError::from(BookingError::MissingField("phone"));
        assert_eq!(err.to_string(), "phone is required");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
