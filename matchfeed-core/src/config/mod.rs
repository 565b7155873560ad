//! Runtime configuration for the match feed.
//!
//! These types are the validated form injected at construction. Loading and
//! parsing from files is handled by the server crate.

use std::time::Duration;

/// Keywords that mark an event's player as the opposition.
///
/// Matching is exact after trimming and lowercasing. The defaults are the
/// sentinel names feeds use for goals and cards that are not ours.
pub const DEFAULT_OPPOSITION_KEYWORDS: [&str; 2] = ["Opposition", "Goal"];

/// Classification settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    pub opposition_keywords: Vec<String>,
    /// Reclassify red cards that follow a yellow as second yellows.
    pub detect_second_yellow: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            opposition_keywords: DEFAULT_OPPOSITION_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            detect_second_yellow: true,
        }
    }
}

/// Bounded retry policy for a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total delivery attempts, including the first one.
    pub max_attempts: u32,
    /// Deadline for each individual attempt.
    pub attempt_timeout: Duration,
    /// Delay before the first retry; doubled on every further retry.
    pub base_backoff: Duration,
    /// Upper bound on any single backoff delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            base_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before retry number `retry` (0-based).
    ///
    /// Uses exponential backoff: `base * 2^retry`, capped at `max_backoff`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(16));
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Longest one dispatch can spend delivering: every attempt timing out
    /// plus every backoff in between.
    pub fn worst_case(&self) -> Duration {
        let attempts = self.attempt_timeout.saturating_mul(self.max_attempts);
        (0..self.max_attempts.saturating_sub(1))
            .map(|retry| self.backoff(retry))
            .fold(attempts, Duration::saturating_add)
    }
}

/// Everything the feed needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub classifier: ClassifierConfig,
    pub retry: RetryPolicy,
    /// How many finished matches stay readable after full time.
    pub archive_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            retry: RetryPolicy::default(),
            archive_capacity: 64,
        }
    }
}
