use anyhow::{bail, Context};

use crate::slot::{Schedule, DEFAULT_LAST_START_HOUR, DEFAULT_OPEN_HOUR};

const DEV_ADMIN_PASSWORD: &str = "admin123";
const DEV_SESSION_SECRET: &str = "dev-session-secret-change-me";

/// Session lifetime when SESSION_TTL_SECS is unset (12 hours).
const DEFAULT_SESSION_TTL_SECS: i64 = 12 * 3600;

/// Server settings, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub admin_email: String,
    pub admin_password: String,
    pub session_secret: String,
    pub session_ttl_secs: i64,
    pub open_hour: u32,
    pub last_start_hour: u32,
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT must be a number, got {raw}"))?,
            None => 3000,
        };
        let session_ttl_secs = match var("SESSION_TTL_SECS") {
            Some(raw) => raw
                .parse::<i64>()
                .with_context(|| format!("SESSION_TTL_SECS must be a number, got {raw}"))?,
            None => DEFAULT_SESSION_TTL_SECS,
        };
        let open_hour = parse_hour(var("OPEN_HOUR"), "OPEN_HOUR", DEFAULT_OPEN_HOUR)?;
        let last_start_hour =
            parse_hour(var("LAST_START_HOUR"), "LAST_START_HOUR", DEFAULT_LAST_START_HOUR)?;
        if last_start_hour < open_hour {
            bail!("LAST_START_HOUR ({last_start_hour}) is before OPEN_HOUR ({open_hour})");
        }

        let admin_password = var("ADMIN_PASSWORD").unwrap_or_else(|| {
            tracing::warn!("ADMIN_PASSWORD not set, using the development default");
            DEV_ADMIN_PASSWORD.into()
        });
        let session_secret = var("SESSION_SECRET").unwrap_or_else(|| {
            tracing::warn!("SESSION_SECRET not set, sessions are signed with a development key");
            DEV_SESSION_SECRET.into()
        });

        Ok(Self {
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:barbershop.db?mode=rwc".into()),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            admin_email: var("ADMIN_EMAIL").unwrap_or_else(|| "admin@barbershop.local".into()),
            admin_password,
            session_secret,
            session_ttl_secs,
            open_hour,
            last_start_hour,
            cors_origin: var("CORS_ORIGIN"),
        })
    }

    pub fn schedule(&self) -> Schedule {
        Schedule::with_hours(self.open_hour, self.last_start_hour)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_hour(raw: Option<String>, key: &str, default: u32) -> anyhow::Result<u32> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let hour: u32 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be an hour between 0 and 23, got {raw}"))?;
    if hour > 23 {
        bail!("{key} must be an hour between 0 and 23, got {hour}");
    }
    Ok(hour)
}
