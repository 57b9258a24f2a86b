//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Calculate the delay after failed attempt `attempt` (1-indexed).
///
/// `min(base_ms * 2^(attempt-1), max_ms)`, plus up to 10% jitter when
/// enabled. Jitter never pushes the delay past `max_ms`.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64, jitter: bool) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Up to 10% extra, clamped to max_ms
    let jitter_range = capped_delay / 10;
    let jitter_ms = if jitter && jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay.saturating_add(jitter_ms).min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(calculate_backoff(1, 100, 2000, false), Duration::from_millis(100));
        assert_eq!(calculate_backoff(2, 100, 2000, false), Duration::from_millis(200));
        assert_eq!(calculate_backoff(3, 100, 2000, false), Duration::from_millis(400));
        assert_eq!(calculate_backoff(10, 100, 1000, false), Duration::from_millis(1000));
    }

    #[test]
    fn test_zero_attempt_and_overflow() {
        assert_eq!(calculate_backoff(0, 100, 2000, true), Duration::ZERO);
        assert_eq!(calculate_backoff(200, 100, 5000, false), Duration::from_millis(5000));
    }

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..100 {
            let b = calculate_backoff(2, 100, 2000, true);
            assert!(b >= Duration::from_millis(200));
            assert!(b < Duration::from_millis(220));

            let capped = calculate_backoff(8, 100, 1000, true);
            assert_eq!(capped, Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_monotonic_without_jitter() {
        let delays: Vec<_> = (1..12).map(|n| calculate_backoff(n, 10, 3000, false)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }
}
