// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Poll budget for change confirmation.
//!
//! A confirmation waits one interval after the publish is acknowledged,
//! re-fetches the topic, and repeats until the value matches or the budget
//! runs out. Worst case latency is `max_polls * interval` plus the publish
//! round trip.
//!
//! # Example
//!
//! ```
//! use topic_cache::PollPolicy;
//! use std::time::Duration;
//!
//! // Detail views: 5 polls, half a second apart
//! let standard = PollPolicy::standard();
//! assert_eq!(standard.max_polls, 5);
//! assert_eq!(standard.interval, Duration::from_millis(500));
//!
//! // Dashboard toggles give the backend a little longer
//! let interactive = PollPolicy::interactive();
//! assert_eq!(interactive.max_polls, 10);
//! assert_eq!(interactive.worst_case(), Duration::from_secs(5));
//! ```

use std::time::Duration;

use crate::config::TopicCacheConfig;

/// How many times, and how far apart, to re-read a changed topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fetch attempts before giving up (at least 1)
    pub max_polls: u32,
    /// Delay before each attempt, including the first
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl PollPolicy {
    #[must_use]
    pub fn new(max_polls: u32, interval: Duration) -> Self {
        Self { max_polls, interval }
    }

    /// 5 polls at 500 ms.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            max_polls: 5,
            interval: Duration::from_millis(500),
        }
    }

    /// 10 polls at 500 ms, for controls the user is watching.
    #[must_use]
    pub fn interactive() -> Self {
        Self {
            max_polls: 10,
            interval: Duration::from_millis(500),
        }
    }

    #[must_use]
    pub fn from_config(config: &TopicCacheConfig) -> Self {
        Self {
            max_polls: config.max_polls,
            interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    /// Time spent polling if nothing ever matches.
    #[must_use]
    pub fn worst_case(&self) -> Duration {
        self.interval * self.max_polls
    }

    /// Fast polling for tests
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_polls: 3,
            interval: Duration::from_millis(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_presets() {
        assert_eq!(PollPolicy::default(), PollPolicy::standard());
        assert_eq!(PollPolicy::standard().worst_case(), Duration::from_millis(2500));
        assert_eq!(PollPolicy::test().worst_case(), Duration::from_millis(30));
    }

    #[test]
    fn test_policy_from_config() {
        let config = TopicCacheConfig {
            max_polls: 7,
            poll_interval_ms: 250,
            ..Default::default()
        };
        let policy = PollPolicy::from_config(&config);
        assert_eq!(policy, PollPolicy::new(7, Duration::from_millis(250)));
    }
}
