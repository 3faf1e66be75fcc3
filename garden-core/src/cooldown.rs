//! Cooldown eligibility computed on demand from a stored timestamp.
//!
//! No background timer runs anywhere in the engine: every check derives
//! eligibility from `last_play_at` and an explicit `now`, which avoids
//! drift and survives restarts. Only play resolution (or a dev override)
//! advances the stored timestamp.

use chrono::{DateTime, Utc};

/// Result of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownStatus {
    /// Whether the player may start a round right now.
    pub can_play: bool,
    /// Whole seconds until eligibility, rounded up. Zero when eligible.
    pub remaining_seconds: u64,
}

impl CooldownStatus {
    /// An immediately-eligible status.
    #[must_use]
    pub const fn eligible() -> Self {
        Self {
            can_play: true,
            remaining_seconds: 0,
        }
    }
}

/// Check a player's cooldown against an explicit `now`.
///
/// `last_play_at` absent means immediately eligible. Remaining time is
/// `max(0, cooldown - (now - last_play_at))`, rounded up to whole seconds
/// so `can_play` is never reported alongside a zero countdown while the
/// window is still open.
#[must_use]
pub fn check(
    last_play_at: Option<DateTime<Utc>>,
    cooldown_seconds: u64,
    now: DateTime<Utc>,
) -> CooldownStatus {
    let Some(last) = last_play_at else {
        return CooldownStatus::eligible();
    };

    // A stored timestamp in the future (clock skew, restored backup) is
    // treated as "just played": the full window applies, nothing underflows.
    let elapsed_ms = (now - last).num_milliseconds().max(0) as u64;
    let window_ms = cooldown_seconds.saturating_mul(1_000);

    if elapsed_ms >= window_ms {
        return CooldownStatus::eligible();
    }

    let remaining_ms = window_ms - elapsed_ms;
    CooldownStatus {
        can_play: false,
        remaining_seconds: remaining_ms.div_ceil(1_000),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const DAY: u64 = 86_400;

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    #[test]
    fn no_last_play_is_immediately_eligible() {
        let status = check(None, DAY, base());
        assert_eq!(status, CooldownStatus::eligible());
    }

    #[test]
    fn fresh_play_reports_full_window() {
        let now = base();
        let status = check(Some(now), DAY, now);
        assert!(!status.can_play);
        assert_eq!(status.remaining_seconds, DAY);
    }

    #[test]
    fn partial_elapse_counts_down() {
        let last = base();
        let now = last + Duration::seconds(1_000);
        let status = check(Some(last), DAY, now);
        assert!(!status.can_play);
        assert_eq!(status.remaining_seconds, DAY - 1_000);
    }

    #[test]
    fn sub_second_remainder_rounds_up() {
        let last = base();
        let now = last + Duration::milliseconds((DAY as i64) * 1_000 - 250);
        let status = check(Some(last), DAY, now);
        assert!(!status.can_play);
        assert_eq!(status.remaining_seconds, 1);
    }

    #[test]
    fn exact_boundary_is_eligible() {
        let last = base();
        let now = last + Duration::seconds(DAY as i64);
        assert!(check(Some(last), DAY, now).can_play);
    }

    #[test]
    fn future_last_play_clamps_to_full_window() {
        let last = base() + Duration::seconds(3_600);
        let status = check(Some(last), DAY, base());
        assert!(!status.can_play);
        assert_eq!(status.remaining_seconds, DAY);
    }

    #[test]
    fn remaining_is_non_increasing() {
        let last = base();
        let mut previous = u64::MAX;
        for offset in [0i64, 1, 60, 3_600, 40_000, 86_399, 86_400, 90_000] {
            let status = check(Some(last), DAY, last + Duration::seconds(offset));
            assert!(status.remaining_seconds <= previous);
            previous = status.remaining_seconds;
        }
    }
}
