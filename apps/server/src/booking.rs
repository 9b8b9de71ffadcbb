//! Booking workflow: read the day's appointments, validate, insert.
//!
//! The read and the write for one date run under a per-date lock and inside a
//! single transaction, so two submissions for the same slot cannot both pass
//! the overlap check.

use chrono::NaiveDate;
use dashmap::DashMap;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::db::{self, NewAppointment};
use crate::models::{Appointment, AppointmentSubmission};
use crate::slot::{self, RejectionReason, Schedule, SlotRequest};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error(transparent)]
    Rejected(#[from] RejectionReason),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

// ── Per-date locks ──

/// One async mutex per calendar date, created on demand.
#[derive(Debug, Clone, Default)]
pub struct DateLocks {
    locks: Arc<DashMap<NaiveDate, Arc<Mutex<()>>>>,
}

impl DateLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_date(&self, date: NaiveDate) -> Arc<Mutex<()>> {
        self.locks.entry(date).or_default().clone()
    }

    /// Drop locks nobody is holding or waiting on.
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.len()
    }
}

// ── Workflow ──

/// Everything `book` needs besides the submission itself.
pub struct BookingContext<'a> {
    pub db: &'a SqlitePool,
    pub locks: &'a DateLocks,
    pub schedule: &'a Schedule,
    pub clock: &'a dyn Clock,
}

/// Validate a form submission and store it if the slot is free.
pub async fn book(
    ctx: &BookingContext<'_>,
    submission: &AppointmentSubmission,
) -> Result<Appointment, BookingError> {
    let name = required("name", &submission.name)?;
    let phone = required("phone", &submission.phone)?;
    let service = required("service", &submission.service)?;

    let date = slot::parse_date(&submission.date).ok_or(RejectionReason::InvalidDateTime)?;
    let lock = ctx.locks.for_date(date);
    let _guard = lock.lock().await;

    let mut tx = ctx.db.begin().await?;
    let booked = db::appointments_on(&mut *tx, date).await?;

    let now = ctx.clock.now();
    let request = SlotRequest {
        date: &submission.date,
        time: &submission.time,
    };
    let accepted = ctx.schedule.validate(request, &booked, now)?;

    let new = NewAppointment {
        name,
        phone,
        date: accepted.date,
        slot: accepted.slot,
        service,
        created_at: now,
    };
    let id = db::insert_appointment(&mut *tx, &new).await?;
    tx.commit().await?;

    tracing::info!(
        "Appointment {} booked for {} at {}",
        id,
        accepted.date,
        slot::format_time(accepted.slot.start)
    );

    Ok(Appointment {
        id,
        name: name.to_string(),
        phone: phone.to_string(),
        date: accepted.date,
        start_time: accepted.slot.start,
        end_time: accepted.slot.end,
        service: service.to_string(),
        created_at: now,
    })
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, BookingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BookingError::MissingField(field));
    }
    Ok(trimmed)
}
