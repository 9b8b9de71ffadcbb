use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::ApiResponse;

// ── Configuration ──

/// Route groups with independent limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Read-only public endpoints.
    Public,
    /// Appointment submission.
    Booking,
    /// Admin login attempts.
    Login,
    /// Authenticated admin endpoints.
    Admin,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Public, Tier::Booking, Tier::Login, Tier::Admin];

    pub fn default_config(self) -> RateLimitConfig {
        let (max_requests, secs) = match self {
            Tier::Public => (60, 60),
            Tier::Booking => (5, 300),
            Tier::Login => (10, 300),
            Tier::Admin => (120, 60),
        };
        RateLimitConfig {
            max_requests,
            window: Duration::from_secs(secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed within the sliding window.
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Debug)]
struct TierState {
    config: RateLimitConfig,
    hits: DashMap<IpAddr, Vec<Instant>>,
}

// ── Core Rate Limiter ──

/// In-memory per-IP sliding-window limiter. Tiers that were never registered
/// are not limited.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    tiers: Arc<DashMap<Tier, TierState>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limiter with every tier registered at its default limits.
    pub fn with_defaults() -> Self {
        let limiter = Self::new();
        for tier in Tier::ALL {
            limiter.add_tier(tier, tier.default_config());
        }
        limiter
    }

    pub fn add_tier(&self, tier: Tier, config: RateLimitConfig) {
        self.tiers.insert(
            tier,
            TierState {
                config,
                hits: DashMap::new(),
            },
        );
    }

    /// `Err(retry_after_secs)` when `ip` has used up its window.
    pub fn check(&self, tier: Tier, ip: IpAddr) -> Result<(), u64> {
        let Some(state) = self.tiers.get(&tier) else {
            return Ok(());
        };
        let config = &state.config;
        let now = Instant::now();

        let mut hits = state.hits.entry(ip).or_default();
        hits.retain(|t| now.duration_since(*t) < config.window);

        if hits.len() >= config.max_requests as usize {
            let retry_after = (hits[0] + config.window)
                .saturating_duration_since(now)
                .as_secs()
                .max(1);
            return Err(retry_after);
        }

        hits.push(now);
        Ok(())
    }

    /// Remove entries idle for more than two windows.
    pub fn cleanup(&self) {
        let now = Instant::now();
        for state in self.tiers.iter() {
            let cutoff = state.config.window * 2;
            state.hits.retain(|_ip, times| {
                times.retain(|t| now.duration_since(*t) < cutoff);
                !times.is_empty()
            });
        }
    }

    /// Middleware state binding this limiter to one tier.
    pub fn guard(&self, tier: Tier) -> TierGuard {
        TierGuard {
            limiter: self.clone(),
            tier,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TierGuard {
    limiter: RateLimiter,
    tier: Tier,
}

// ── IP Extraction ──

/// Client IP from X-Forwarded-For (reverse proxy) or the socket address.
pub fn extract_client_ip(req: &Request) -> IpAddr {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());
    if let Some(ip) = forwarded {
        return ip;
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn too_many_requests(retry_after: u64) -> Response {
    let body = ApiResponse::<()>::error(format!(
        "Too many requests. Try again in {} seconds",
        retry_after
    ))
    .with_code("rate_limited");
    (
        StatusCode::TOO_MANY_REQUESTS,
        [("Retry-After", retry_after.to_string())],
        Json(body),
    )
        .into_response()
}

/// Per-tier rate limiting middleware; use with `from_fn_with_state(limiter.guard(tier), enforce)`.
pub async fn enforce(
    State(guard): State<TierGuard>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = extract_client_ip(&req);
    guard
        .limiter
        .check(guard.tier, ip)
        .map_err(too_many_requests)?;
    Ok(next.run(req).await)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn limiter(tier: Tier, max_requests: u32, window: Duration) -> RateLimiter {
        let limiter = RateLimiter::new();
        limiter.add_tier(tier, RateLimitConfig { max_requests, window });
        limiter
    }

    #[test]
    fn test_allows_up_to_limit_then_rejects() {
        let limiter = limiter(Tier::Booking, 3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check(Tier::Booking, ip(1)).is_ok());
        }
        let retry_after = limiter.check(Tier::Booking, ip(1)).unwrap_err();
        assert!((1..=60).contains(&retry_after));
    }

    #[test]
    fn test_unregistered_tier_is_unlimited() {
        let limiter = limiter(Tier::Booking, 1, Duration::from_secs(60));
        for _ in 0..10 {
            assert!(limiter.check(Tier::Public, ip(1)).is_ok());
        }
    }

    #[test]
    fn test_ips_and_tiers_independent() {
        let limiter = limiter(Tier::Login, 1, Duration::from_secs(60));
        limiter.add_tier(
            Tier::Admin,
            RateLimitConfig { max_requests: 1, window: Duration::from_secs(60) },
        );
        assert!(limiter.check(Tier::Login, ip(1)).is_ok());
        assert!(limiter.check(Tier::Login, ip(1)).is_err());
        assert!(limiter.check(Tier::Login, ip(2)).is_ok());
        assert!(limiter.check(Tier::Admin, ip(1)).is_ok());
    }

    #[test]
    fn test_window_expiry_allows_again() {
        let limiter = limiter(Tier::Public, 1, Duration::from_millis(100));
        assert!(limiter.check(Tier::Public, ip(1)).is_ok());
        assert!(limiter.check(Tier::Public, ip(1)).is_err());

        sleep(Duration::from_millis(150));

        assert!(limiter.check(Tier::Public, ip(1)).is_ok());
    }

    #[test]
    fn test_cleanup_keeps_active_entries() {
        let limiter = limiter(Tier::Admin, 2, Duration::from_secs(60));
        limiter.check(Tier::Admin, ip(1)).unwrap();
        limiter.cleanup();
        limiter.check(Tier::Admin, ip(1)).unwrap();
        assert!(limiter.check(Tier::Admin, ip(1)).is_err());
    }

    #[test]
    fn test_cleanup_drops_stale_entries() {
        let limiter = limiter(Tier::Public, 10, Duration::from_millis(50));
        limiter.check(Tier::Public, ip(1)).unwrap();
        sleep(Duration::from_millis(120));
        limiter.cleanup();

        let state = limiter.tiers.get(&Tier::Public).unwrap();
        assert!(state.hits.is_empty());
    }

    #[test]
    fn test_defaults_register_every_tier() {
        let limiter = RateLimiter::with_defaults();
        assert_eq!(limiter.tiers.len(), Tier::ALL.len());
        assert_eq!(Tier::Booking.default_config().max_requests, 5);
    }
}
