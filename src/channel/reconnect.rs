//! Reconnect policy for unsolicited connection loss

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do when a connection closes or fails without being superseded.
///
/// The default is [`ReconnectPolicy::Never`]: the last good curve stays
/// visible and the caller decides when to `configure` again.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReconnectPolicy {
    #[default]
    Never,

    /// Constant delay between attempts
    Fixed {
        delay_ms: u64,
        #[serde(default)]
        max_attempts: Option<u32>,
    },

    /// Delay grows by `factor` per consecutive failure, capped at `max_ms`
    Backoff {
        initial_ms: u64,
        max_ms: u64,
        #[serde(default = "default_factor")]
        factor: f64,
        #[serde(default)]
        max_attempts: Option<u32>,
    },
}

fn default_factor() -> f64 {
    2.0
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        ReconnectPolicy::Fixed { delay_ms: delay.as_millis() as u64, max_attempts: None }
    }

    /// Doubling backoff from `initial` up to `max`.
    pub fn backoff(initial: Duration, max: Duration) -> Self {
        ReconnectPolicy::Backoff {
            initial_ms: initial.as_millis() as u64,
            max_ms: max.as_millis() as u64,
            factor: default_factor(),
            max_attempts: None,
        }
    }

    /// Give up after `attempts` consecutive reconnects.
    pub fn with_max_attempts(self, attempts: u32) -> Self {
        match self {
            ReconnectPolicy::Never => ReconnectPolicy::Never,
            ReconnectPolicy::Fixed { delay_ms, .. } => {
                ReconnectPolicy::Fixed { delay_ms, max_attempts: Some(attempts) }
            }
            ReconnectPolicy::Backoff { initial_ms, max_ms, factor, .. } => {
                ReconnectPolicy::Backoff { initial_ms, max_ms, factor, max_attempts: Some(attempts) }
            }
        }
    }

    /// Delay before reconnect number `attempt` (1 for the first retry after a
    /// loss), or `None` to stop.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        let attempt = attempt.max(1);
        match *self {
            ReconnectPolicy::Never => None,
            ReconnectPolicy::Fixed { delay_ms, max_attempts } => {
                within(attempt, max_attempts).then(|| Duration::from_millis(delay_ms))
            }
            ReconnectPolicy::Backoff { initial_ms, max_ms, factor, max_attempts } => {
                if !within(attempt, max_attempts) {
                    return None;
                }
                let factor = if factor.is_finite() && factor >= 1.0 { factor } else { 1.0 };
                let scaled = initial_ms as f64 * factor.powi(attempt.saturating_sub(1).min(64) as i32);
                let capped = scaled.min(max_ms.max(initial_ms) as f64);
                Some(Duration::from_millis(capped as u64))
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, ReconnectPolicy::Never)
    }
}

fn within(attempt: u32, max_attempts: Option<u32>) -> bool {
    max_attempts.is_none_or(|max| attempt <= max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_gives_up_immediately() {
        assert_eq!(ReconnectPolicy::Never.delay_for(1), None);
        assert!(!ReconnectPolicy::default().is_enabled());
    }

    #[test]
    fn fixed_delay_respects_attempt_cap() {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(250)).with_max_attempts(2);
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay_for(3), None);
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = ReconnectPolicy::backoff(Duration::from_millis(100), Duration::from_millis(1000));
        let delays: Vec<u64> =
            (1..=6).map(|a| policy.delay_for(a).unwrap().as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
        assert!(policy.delay_for(u32::MAX).is_some());
    }

    #[test]
    fn parses_from_yaml() {
        let policy: ReconnectPolicy =
            serde_yaml_ng::from_str("mode: backoff\ninitial_ms: 50\nmax_ms: 800\n").unwrap();
        assert_eq!(
            policy,
            ReconnectPolicy::Backoff { initial_ms: 50, max_ms: 800, factor: 2.0, max_attempts: None }
        );

        let never: ReconnectPolicy = serde_yaml_ng::from_str("mode: never").unwrap();
        assert_eq!(never, ReconnectPolicy::Never);
    }
}
