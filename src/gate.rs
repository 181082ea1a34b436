//! Free-tier usage gate for AI readings.
//!
//! A non-premium device gets one free reading per rolling 24-hour window.
//! The gate is a deliberate UX soft-limit: profiles are unauthenticated
//! per-device records, and discarding a profile resets the clock. All
//! functions take an explicit `now_ms` so the policy is testable without a
//! wall clock.

use crate::model::DeviceProfile;

/// Rolling window between free readings.
pub const FREE_WINDOW_MS: u64 = 86_400_000;

/// Whether the profile may use a free reading right now. Premium profiles
/// always may; otherwise the last recorded use must be strictly more than
/// 24 hours ago (or absent).
pub fn can_use(profile: &DeviceProfile, now_ms: u64) -> bool {
    if profile.premium {
        return true;
    }
    match profile.last_free_use_ms {
        None => true,
        Some(last) => now_ms.saturating_sub(last) > FREE_WINDOW_MS,
    }
}

/// Record a consumed reading. Premium usage never touches the free-tier
/// clock.
pub fn register_usage(profile: &mut DeviceProfile, now_ms: u64) {
    if profile.premium {
        return;
    }
    profile.last_free_use_ms = Some(now_ms);
}

/// Human-readable time until the window reopens: `"{hours}h {minutes}m"`,
/// `"available"` when usable, `"unlimited"` for premium profiles.
pub fn time_remaining(profile: &DeviceProfile, now_ms: u64) -> String {
    if profile.premium {
        return "unlimited".into();
    }
    let Some(last) = profile.last_free_use_ms else {
        return "available".into();
    };
    let elapsed = now_ms.saturating_sub(last);
    if elapsed > FREE_WINDOW_MS {
        return "available".into();
    }
    let left = FREE_WINDOW_MS - elapsed;
    let hours = left / 3_600_000;
    let minutes = (left % 3_600_000) / 60_000;
    format!("{hours}h {minutes}m")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> DeviceProfile {
        DeviceProfile::new("dev1".into(), 0)
    }

    #[test]
    fn fresh_profile_can_use() {
        assert!(can_use(&profile(), 1_000));
    }

    #[test]
    fn window_boundary_is_strict() {
        let mut p = profile();
        let t = 1_700_000_000_000;
        register_usage(&mut p, t);
        assert!(!can_use(&p, t));
        assert!(!can_use(&p, t + 86_399_999));
        assert!(!can_use(&p, t + 86_400_000));
        assert!(can_use(&p, t + 86_400_001));
    }

    #[test]
    fn premium_ignores_the_clock() {
        let mut p = profile();
        register_usage(&mut p, 1_000);
        p.premium = true;
        assert!(can_use(&p, 1_001));
    }

    #[test]
    fn premium_usage_does_not_consume_the_free_clock() {
        let mut p = profile();
        p.premium = true;
        register_usage(&mut p, 1_000);
        assert!(p.last_free_use_ms.is_none());
        // dropping premium later leaves the free reading intact
        p.premium = false;
        assert!(can_use(&p, 1_001));
    }

    #[test]
    fn time_remaining_formats_hours_and_minutes() {
        let mut p = profile();
        let t = 1_700_000_000_000;
        register_usage(&mut p, t);
        // 2h 30m into the window leaves 21h 30m
        assert_eq!(time_remaining(&p, t + 2 * 3_600_000 + 30 * 60_000), "21h 30m");
        assert_eq!(time_remaining(&p, t), "24h 0m");
        assert_eq!(time_remaining(&p, t + FREE_WINDOW_MS + 1), "available");
    }

    #[test]
    fn time_remaining_sentinels() {
        let mut p = profile();
        assert_eq!(time_remaining(&p, 5), "available");
        p.premium = true;
        register_usage(&mut p, 5);
        assert_eq!(time_remaining(&p, 6), "unlimited");
    }

    #[test]
    fn clock_rollback_keeps_the_gate_closed() {
        let mut p = profile();
        register_usage(&mut p, 1_000_000);
        // a client clock running behind the recorded use must not reopen
        assert!(!can_use(&p, 500_000));
    }
}
