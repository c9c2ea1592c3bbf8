// In-memory rate limiter for oracle-backed and raid actions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Different rate limit types with their constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitType {
    /// Actions that call the generation oracle (spawn, battle, evolve, merge).
    OracleActions,
    /// Raid hits against the world boss.
    Raids,
}

impl RateLimitType {
    /// Maximum number of events allowed in the window.
    pub fn max_count(&self) -> usize {
        match self {
            RateLimitType::OracleActions => 20,
            RateLimitType::Raids => 30,
        }
    }

    /// Time window for the rate limit.
    pub fn window(&self) -> Duration {
        match self {
            RateLimitType::OracleActions => Duration::from_secs(600),
            RateLimitType::Raids => Duration::from_secs(600),
        }
    }
}

impl std::fmt::Display for RateLimitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateLimitType::OracleActions => write!(f, "summoning actions per 10 minutes"),
            RateLimitType::Raids => write!(f, "raids per 10 minutes"),
        }
    }
}

/// Error returned when a rate limit is exceeded.
#[derive(Debug, Clone, thiserror::Error)]
#[error("slow down: max {max} {limit_type}, next slot in {retry_after_secs}s")]
pub struct RateLimitError {
    pub limit_type: RateLimitType,
    pub max: usize,
    /// Seconds until the oldest event in the window expires.
    pub retry_after_secs: u64,
}

/// Key for the rate limit map: (player_id, limit_type).
type LimitKey = (String, RateLimitType);

/// Sliding-window limiter keyed by player and action type.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<HashMap<LimitKey, Vec<Instant>>>>,
    enabled: bool,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            enabled: true,
        }
    }

    /// A limiter that lets everything through.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    /// Record one event for `player_id`, or reject it when the window is
    /// already full. Rejected events are not recorded.
    pub fn check_limit(
        &self,
        player_id: &str,
        limit_type: RateLimitType,
    ) -> Result<(), RateLimitError> {
        self.check_at(player_id, limit_type, Instant::now())
    }

    fn check_at(
        &self,
        player_id: &str,
        limit_type: RateLimitType,
        now: Instant,
    ) -> Result<(), RateLimitError> {
        if !self.enabled {
            return Ok(());
        }
        let window = limit_type.window();
        let max = limit_type.max_count();

        let mut map = self.inner.lock().unwrap();
        let entries = map.entry((player_id.to_string(), limit_type)).or_default();
        entries.retain(|t| now.saturating_duration_since(*t) < window);

        if entries.len() >= max {
            let oldest = entries.iter().min().copied().unwrap_or(now);
            let remaining = window.saturating_sub(now.saturating_duration_since(oldest));
            return Err(RateLimitError {
                limit_type,
                max,
                retry_after_secs: remaining.as_secs().max(1),
            });
        }

        entries.push(now);
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_allows_within_limit() {
        let limiter = RateLimiter::new();

        for _ in 0..20 {
            assert!(limiter
                .check_limit("p1", RateLimitType::OracleActions)
                .is_ok());
        }
    }

    #[test]
    fn test_rate_limiter_denies_over_limit() {
        let limiter = RateLimiter::new();

        for _ in 0..20 {
            limiter
                .check_limit("p1", RateLimitType::OracleActions)
                .unwrap();
        }
        let err = limiter
            .check_limit("p1", RateLimitType::OracleActions)
            .unwrap_err();
        assert_eq!(err.max, 20);
        assert_eq!(err.limit_type, RateLimitType::OracleActions);
    }

    #[test]
    fn test_rate_limiter_separate_players_and_types() {
        let limiter = RateLimiter::new();

        for _ in 0..30 {
            limiter.check_limit("p1", RateLimitType::Raids).unwrap();
        }
        assert!(limiter.check_limit("p1", RateLimitType::Raids).is_err());

        // Other players and other limit types are unaffected
        assert!(limiter.check_limit("p2", RateLimitType::Raids).is_ok());
        assert!(limiter
            .check_limit("p1", RateLimitType::OracleActions)
            .is_ok());
    }

    #[test]
    fn test_disabled_limiter_never_rejects() {
        let limiter = RateLimiter::disabled();
        for _ in 0..100 {
            assert!(limiter.check_limit("p1", RateLimitType::Raids).is_ok());
        }
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        for _ in 0..30 {
            limiter.check_at("p1", RateLimitType::Raids, start).unwrap();
        }
        let later = start + Duration::from_secs(120);
        let err = limiter
            .check_at("p1", RateLimitType::Raids, later)
            .unwrap_err();
        assert_eq!(err.retry_after_secs, 480);

        let expired = start + RateLimitType::Raids.window();
        assert!(limiter.check_at("p1", RateLimitType::Raids, expired).is_ok());
    }

    #[test]
    fn test_rate_limit_error_display() {
        let err = RateLimitError {
            limit_type: RateLimitType::OracleActions,
            max: 20,
            retry_after_secs: 42,
        };
        assert_eq!(
            err.to_string(),
            "slow down: max 20 summoning actions per 10 minutes, next slot in 42s"
        );
    }
}
