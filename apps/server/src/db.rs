use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{SqliteExecutor, SqlitePool};

use crate::models::{Appointment, Service};
use crate::slot::TimeSlot;

/// Ordered schema migrations. Each runs once and is recorded in `_migrations`.
const MIGRATIONS: &[(&str, &str)] = &[
    ("001_init", include_str!("../migrations/001_init.sql")),
    ("002_seed_services", SEED_SERVICES),
];

const SEED_SERVICES: &str = "INSERT OR IGNORE INTO services (name, description, price, sort_order) VALUES
    ('Haircut', 'Classic haircut', 25, 1),
    ('Beard', 'Trim and shape the beard', 20, 2),
    ('Haircut + Beard', 'Full package', 40, 3),
    ('Neckline', 'Neckline trim', 10, 4)";

const APPOINTMENT_COLUMNS: &str =
    "SELECT id, name, phone, date, start_time, end_time, service, created_at FROM appointments";

pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    // Enable WAL mode for better concurrent access
    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await?;

    for &(name, sql) in MIGRATIONS {
        let applied: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?")
                .bind(name)
                .fetch_one(pool)
                .await?;
        if applied {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(&mut *tx).await?;
            }
        }
        sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!("Applied migration: {}", name);
    }

    tracing::info!("Database migrations up to date");
    Ok(())
}

// ── Appointments ──

/// Which appointments an admin listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentFilter {
    All,
    On(NaiveDate),
    Between(NaiveDate, NaiveDate),
}

/// An accepted booking ready to be written.
#[derive(Debug, Clone)]
pub struct NewAppointment<'a> {
    pub name: &'a str,
    pub phone: &'a str,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub service: &'a str,
    pub created_at: NaiveDateTime,
}

/// Intervals already booked on `date`, earliest first.
pub async fn appointments_on<'c, E: SqliteExecutor<'c>>(
    db: E,
    date: NaiveDate,
) -> sqlx::Result<Vec<TimeSlot>> {
    let rows = sqlx::query_as::<_, (chrono::NaiveTime, chrono::NaiveTime)>(
        "SELECT start_time, end_time FROM appointments WHERE date = ? ORDER BY start_time ASC",
    )
    .bind(date)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(start, end)| TimeSlot::new(start, end))
        .collect())
}

pub async fn insert_appointment<'c, E: SqliteExecutor<'c>>(
    db: E,
    new: &NewAppointment<'_>,
) -> sqlx::Result<i64> {
    let id = sqlx::query(
        "INSERT INTO appointments (name, phone, date, start_time, end_time, service, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(new.name)
    .bind(new.phone)
    .bind(new.date)
    .bind(new.slot.start)
    .bind(new.slot.end)
    .bind(new.service)
    .bind(new.created_at)
    .execute(db)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn list_appointments<'c, E: SqliteExecutor<'c>>(
    db: E,
    filter: AppointmentFilter,
) -> sqlx::Result<Vec<Appointment>> {
    match filter {
        AppointmentFilter::All => {
            let query = format!("{} ORDER BY date ASC, start_time ASC", APPOINTMENT_COLUMNS);
            sqlx::query_as::<_, Appointment>(&query).fetch_all(db).await
        }
        AppointmentFilter::On(date) => {
            let query = format!(
                "{} WHERE date = ? ORDER BY start_time ASC",
                APPOINTMENT_COLUMNS
            );
            sqlx::query_as::<_, Appointment>(&query)
                .bind(date)
                .fetch_all(db)
                .await
        }
        AppointmentFilter::Between(from, to) => {
            let query = format!(
                "{} WHERE date >= ? AND date <= ? ORDER BY date ASC, start_time ASC",
                APPOINTMENT_COLUMNS
            );
            sqlx::query_as::<_, Appointment>(&query)
                .bind(from)
                .bind(to)
                .fetch_all(db)
                .await
        }
    }
}

/// The first `limit` appointments dated `today` or later, including today's earlier ones.
pub async fn upcoming_appointments<'c, E: SqliteExecutor<'c>>(
    db: E,
    today: NaiveDate,
    limit: i64,
) -> sqlx::Result<Vec<Appointment>> {
    let query = format!(
        "{} WHERE date >= ? ORDER BY date ASC, start_time ASC LIMIT ?",
        APPOINTMENT_COLUMNS
    );
    sqlx::query_as::<_, Appointment>(&query)
        .bind(today)
        .bind(limit)
        .fetch_all(db)
        .await
}

pub async fn count_appointments<'c, E: SqliteExecutor<'c>>(db: E) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM appointments")
        .fetch_one(db)
        .await
}

/// Distinct customers, identified by phone number.
pub async fn count_customers<'c, E: SqliteExecutor<'c>>(db: E) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(DISTINCT phone) FROM appointments")
        .fetch_one(db)
        .await
}

// ── Services ──

pub async fn list_active_services<'c, E: SqliteExecutor<'c>>(
    db: E,
) -> sqlx::Result<Vec<Service>> {
    sqlx::query_as::<_, Service>(
        "SELECT id, name, description, price, is_active
         FROM services WHERE is_active = 1 ORDER BY sort_order ASC",
    )
    .fetch_all(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, memory_pool};
    use chrono::NaiveTime;

    fn slot(hour: u32) -> TimeSlot {
        TimeSlot::new(
            NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(hour + 1, 0, 0).unwrap(),
        )
    }

    fn new_appointment<'a>(phone: &'a str, date: &str, hour: u32) -> NewAppointment<'a> {
        NewAppointment {
            name: "Carlos",
            phone,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            slot: slot(hour),
            service: "Haircut",
            created_at: at("2024-06-01", "08:00"),
        }
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_seeded_services() {
        let pool = memory_pool().await;
        let services = list_active_services(&pool).await.unwrap();
        let names: Vec<&str> = services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Haircut", "Beard", "Haircut + Beard", "Neckline"]);
    }

    #[tokio::test]
    async fn test_appointments_on_filters_and_orders() {
        let pool = memory_pool().await;
        insert_appointment(&pool, &new_appointment("1", "2024-06-10", 14)).await.unwrap();
        insert_appointment(&pool, &new_appointment("2", "2024-06-10", 9)).await.unwrap();
        insert_appointment(&pool, &new_appointment("3", "2024-06-11", 10)).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let slots = appointments_on(&pool, date).await.unwrap();
        assert_eq!(slots, vec![slot(9), slot(14)]);
    }

    #[tokio::test]
    async fn test_round_trip_row() {
        let pool = memory_pool().await;
        let id = insert_appointment(&pool, &new_appointment("555-0101", "2024-06-10", 10))
            .await
            .unwrap();

        let rows = list_appointments(&pool, AppointmentFilter::All).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].phone, "555-0101");
        assert_eq!(rows[0].start_time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(rows[0].end_time, NaiveTime::from_hms_opt(11, 0, 0).unwrap());
        assert_eq!(rows[0].created_at, at("2024-06-01", "08:00"));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let pool = memory_pool().await;
        for (phone, date) in [("1", "2024-06-10"), ("2", "2024-06-11"), ("3", "2024-06-14")] {
            insert_appointment(&pool, &new_appointment(phone, date, 10)).await.unwrap();
        }
        let d = |raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap();

        let on = list_appointments(&pool, AppointmentFilter::On(d("2024-06-11")))
            .await
            .unwrap();
        assert_eq!(on.len(), 1);
        assert_eq!(on[0].phone, "2");

        let between = list_appointments(
            &pool,
            AppointmentFilter::Between(d("2024-06-10"), d("2024-06-11")),
        )
        .await
        .unwrap();
        assert_eq!(between.len(), 2);
    }

    #[tokio::test]
    async fn test_upcoming_and_counts() {
        let pool = memory_pool().await;
        insert_appointment(&pool, &new_appointment("1", "2024-06-10", 9)).await.unwrap();
        insert_appointment(&pool, &new_appointment("1", "2024-06-10", 15)).await.unwrap();
        insert_appointment(&pool, &new_appointment("2", "2024-06-11", 10)).await.unwrap();

        insert_appointment(&pool, &new_appointment("3", "2024-06-07", 11)).await.unwrap();
        let d = |raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap();

        // Today's 09:00 stays listed even after it has started
        let upcoming = upcoming_appointments(&pool, d("2024-06-10"), 5).await.unwrap();
        assert_eq!(upcoming.len(), 3);
        assert_eq!(upcoming[0].start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(upcoming[2].date, d("2024-06-11"));

        let limited = upcoming_appointments(&pool, d("2024-06-01"), 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);

        assert_eq!(count_appointments(&pool).await.unwrap(), 4);
        assert_eq!(count_customers(&pool).await.unwrap(), 3);
    }
}
