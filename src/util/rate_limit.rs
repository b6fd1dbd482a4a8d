//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Move/shoot messages per second (clients send at most one per frame)
pub const ACTION_RATE_LIMIT: u32 = 120;

/// Challenge and quick-match requests per second
pub const LOBBY_RATE_LIMIT: u32 = 5;

/// Per-connection rate limiter state
#[derive(Clone)]
pub struct ParticipantRateLimiter {
    action_limiter: Arc<Limiter>,
    lobby_limiter: Arc<Limiter>,
}

impl ParticipantRateLimiter {
    pub fn new(action_per_second: u32, lobby_per_second: u32) -> Self {
        Self {
            action_limiter: create_limiter(action_per_second),
            lobby_limiter: create_limiter(lobby_per_second),
        }
    }

    /// Check if a move/shoot message is allowed (returns true if allowed)
    pub fn check_action(&self) -> bool {
        self.action_limiter.check().is_ok()
    }

    /// Check if a challenge/match request is allowed
    pub fn check_lobby(&self) -> bool {
        self.lobby_limiter.check().is_ok()
    }
}

impl Default for ParticipantRateLimiter {
    fn default() -> Self {
        Self::new(ACTION_RATE_LIMIT, LOBBY_RATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lobby_burst_is_capped() {
        let limiter = ParticipantRateLimiter::new(100, 2);
        assert!(limiter.check_lobby());
        assert!(limiter.check_lobby());
        assert!(!limiter.check_lobby());
        // Action budget is tracked separately
        assert!(limiter.check_action());
    }
}
