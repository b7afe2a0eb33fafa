//! Configuration for the topic cache.
//!
//! # Example
//!
//! ```
//! use topic_cache::TopicCacheConfig;
//!
//! // Minimal config (uses defaults)
//! let config = TopicCacheConfig::default();
//! assert_eq!(config.max_polls, 5);
//! assert_eq!(config.poll_interval_ms, 500);
//!
//! // Faster confirmation for a local backend
//! let config = TopicCacheConfig {
//!     max_polls: 10,
//!     poll_interval_ms: 100,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;

/// Configuration for the topic cache and change confirmation.
///
/// All fields have sensible defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicCacheConfig {
    /// Re-fetch attempts before a change is reported as failed (default: 5)
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    /// Delay before each confirmation poll, in ms (default: 500)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Confirmation fetch settings: only the topic itself, no history/reason
    #[serde(default)]
    pub confirm_depth: u32,
    #[serde(default)]
    pub confirm_history: bool,
    #[serde(default)]
    pub confirm_reason: bool,

    /// Defaults for one-shot refresh cycles
    #[serde(default = "default_refresh_depth")]
    pub refresh_depth: u32,
    #[serde(default)]
    pub refresh_history: bool,
    #[serde(default = "default_refresh_reason")]
    pub refresh_reason: bool,
}

fn default_max_polls() -> u32 { 5 }
fn default_poll_interval_ms() -> u64 { 500 }
fn default_refresh_depth() -> u32 { 1 }
fn default_refresh_reason() -> bool { true }

impl Default for TopicCacheConfig {
    fn default() -> Self {
        Self {
            max_polls: default_max_polls(),
            poll_interval_ms: default_poll_interval_ms(),
            confirm_depth: 0,
            confirm_history: false,
            confirm_reason: false,
            refresh_depth: default_refresh_depth(),
            refresh_history: false,
            refresh_reason: default_refresh_reason(),
        }
    }
}
