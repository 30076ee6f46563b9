//! Jittered exponential backoff for reconnect loops

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::config::CustodianConfig;

const JITTER_PCT: f64 = 0.2;

/// Reconnect delay state: doubles from `base` up to `max`, reset on progress.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    jitter_pct: f64,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter_pct: f64) -> Self {
        let base_ms = (base.as_millis() as u64).max(1);
        Self {
            base_ms,
            max_ms: (max.as_millis() as u64).max(base_ms),
            jitter_pct: jitter_pct.clamp(0.0, 1.0),
            attempt: 0,
        }
    }

    pub fn from_config(config: &CustodianConfig) -> Self {
        Self::new(config.backoff_base(), config.backoff_max(), JITTER_PCT)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay for the current attempt, then move to the next one.
    pub fn next_delay(&mut self) -> Duration {
        let exp = 2_u64.saturating_pow(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        let delay = self.base_ms.saturating_mul(exp).min(self.max_ms);
        if self.jitter_pct == 0.0 {
            return Duration::from_millis(delay);
        }
        let spread = (delay as f64 * self.jitter_pct) as i64;
        let delta = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis(delay.saturating_add_signed(delta))
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Sleep for the next delay. Returns `false` if cancelled first.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> bool {
        let delay = self.next_delay();
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::time::{advance, pause};

    #[test]
    fn test_delay_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(500), 0.0);
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay()).collect();
        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[2], Duration::from_millis(400));
        assert_eq!(delays[3], Duration::from_millis(500)); // capped
        assert_eq!(delays[4], Duration::from_millis(500));
    }

    #[test]
    fn test_reset_restarts_at_base() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(60), 0.0);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let mut backoff = Backoff::new(Duration::from_millis(1000), Duration::from_secs(60), 0.2);
        for _ in 0..50 {
            backoff.reset();
            let d = backoff.next_delay();
            assert!(d >= Duration::from_millis(800) && d <= Duration::from_millis(1200));
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(60), 0.0);
        for _ in 0..200 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_wait_sleeps_then_returns_true() {
        pause();
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1), 0.0);
        let cancel = CancellationToken::new();
        let waiting = tokio::spawn(async move { backoff.wait(&cancel).await });
        advance(Duration::from_millis(100)).await;
        assert!(waiting.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_returns_false_on_cancel() {
        pause();
        let mut backoff = Backoff::new(Duration::from_secs(30), Duration::from_secs(60), 0.0);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!backoff.wait(&cancel).await);
    }

    proptest! {
        #[test]
        fn prop_delay_bounded_and_non_decreasing(base in 1u64..1_000, max in 1u64..100_000, n in 1usize..80) {
            let mut backoff = Backoff::new(Duration::from_millis(base), Duration::from_millis(max), 0.0);
            let ceiling = Duration::from_millis(max.max(base));
            let mut last = Duration::ZERO;
            for _ in 0..n {
                let d = backoff.next_delay();
                prop_assert!(d <= ceiling);
                prop_assert!(d >= last);
                last = d;
            }
        }
    }
}
