//! Slot validation: decides whether a requested appointment time can be booked.
//!
//! Everything here is pure. The caller supplies the current time and the
//! intervals already booked on the requested date; nothing is read or written.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::Serialize;
use thiserror::Error;

// ── Constants ──

/// Every appointment lasts one hour, whatever the service.
pub const APPOINTMENT_MINUTES: i64 = 60;

/// First hour of the day an appointment may start.
pub const DEFAULT_OPEN_HOUR: u32 = 9;

/// Last hour of the day an appointment may start (inclusive, so 18:xx is bookable).
pub const DEFAULT_LAST_START_HOUR: u32 = 18;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

// ── Rejections ──

/// Why a requested slot was refused. These are ordinary outcomes, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectionReason {
    #[error("Invalid date or time. Use YYYY-MM-DD and HH:MM")]
    InvalidDateTime,
    #[error("Appointments cannot be booked in the past")]
    PastDateTime,
    #[error("12:00 is reserved for the lunch break")]
    LunchBreak,
    #[error("Appointments start Monday to Friday, from the opening hour through the last start hour")]
    OutsideBusinessHours,
    #[error("This time overlaps an existing appointment")]
    SlotConflict,
}

impl RejectionReason {
    /// Stable machine-readable code for API clients.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidDateTime => "invalid_date_time",
            Self::PastDateTime => "past_date_time",
            Self::LunchBreak => "lunch_break",
            Self::OutsideBusinessHours => "outside_business_hours",
            Self::SlotConflict => "slot_conflict",
        }
    }
}

// ── Time interval ──

/// Half-open interval `[start, end)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Interval of `length` beginning at `start`. Clamps to the end of the day
    /// instead of wrapping past midnight.
    pub fn starting_at(start: NaiveTime, length: Duration) -> Self {
        let (end, wrapped) = start.overflowing_add_signed(length);
        let end = if wrapped != 0 { end_of_day() } else { end };
        Self { start, end }
    }

    /// True when the two intervals share any instant.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
}

// ── Request / decision ──

/// A candidate slot exactly as submitted by the booking form.
#[derive(Debug, Clone, Copy)]
pub struct SlotRequest<'a> {
    pub date: &'a str,
    pub time: &'a str,
}

/// A slot that passed every rule, already parsed for the caller to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub date: NaiveDate,
    pub slot: TimeSlot,
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT).ok()
}

/// Formats a time of day the way the booking form submits it.
pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

// ── Rules ──

/// Opening rules for the shop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub open_hour: u32,
    pub last_start_hour: u32,
    pub lunch_start: NaiveTime,
    pub appointment_length: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            open_hour: DEFAULT_OPEN_HOUR,
            last_start_hour: DEFAULT_LAST_START_HOUR,
            lunch_start: NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN),
            appointment_length: Duration::minutes(APPOINTMENT_MINUTES),
        }
    }
}

impl Schedule {
    pub fn with_hours(open_hour: u32, last_start_hour: u32) -> Self {
        Self {
            open_hour,
            last_start_hour,
            ..Self::default()
        }
    }

    /// Decide whether `request` can be booked given the intervals already taken
    /// on the same date. The first failing rule wins.
    pub fn validate(
        &self,
        request: SlotRequest<'_>,
        booked: &[TimeSlot],
        now: NaiveDateTime,
    ) -> Result<Accepted, RejectionReason> {
        let date = parse_date(request.date).ok_or(RejectionReason::InvalidDateTime)?;
        let start = parse_time(request.time).ok_or(RejectionReason::InvalidDateTime)?;
        self.check(date, start, booked, now)
    }

    /// Every on-the-hour start on `date` that `validate` would accept.
    pub fn free_starts(
        &self,
        date: NaiveDate,
        booked: &[TimeSlot],
        now: NaiveDateTime,
    ) -> Vec<TimeSlot> {
        (self.open_hour..=self.last_start_hour)
            .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
            .filter_map(|start| self.check(date, start, booked, now).ok())
            .map(|accepted| accepted.slot)
            .collect()
    }

    fn check(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        booked: &[TimeSlot],
        now: NaiveDateTime,
    ) -> Result<Accepted, RejectionReason> {
        if date.and_time(start) < now {
            return Err(RejectionReason::PastDateTime);
        }
        if start == self.lunch_start {
            return Err(RejectionReason::LunchBreak);
        }
        if !self.is_open(date, start) {
            return Err(RejectionReason::OutsideBusinessHours);
        }

        let slot = TimeSlot::starting_at(start, self.appointment_length);
        if booked.iter().any(|taken| taken.overlaps(&slot)) {
            return Err(RejectionReason::SlotConflict);
        }

        Ok(Accepted { date, slot })
    }

    /// Weekday and start-hour window. The appointment may run past the last
    /// start hour; only the start is constrained.
    fn is_open(&self, date: NaiveDate, start: NaiveTime) -> bool {
        let weekday = !matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
        weekday && (self.open_hour..=self.last_start_hour).contains(&start.hour())
    }
}

// ── Tests ──
