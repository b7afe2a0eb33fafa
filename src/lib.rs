//! # Topic Cache
//!
//! An in-memory cache for a remote device/state graph addressed by
//! slash-delimited topics, plus an optimistic write protocol on top of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         View Layer                          │
//! │  • get_node / get_matches (exact and `%` / `#` patterns)    │
//! │  • request_change(topic, value, policy, on_settled)         │
//! └─────────────────────────────────────────────────────────────┘
//!                 │ reads                    │ writes
//!                 ▼                          ▼
//! ┌──────────────────────────────┐  ┌──────────────────────────┐
//! │         TopicCache           │◄─│    ChangeController      │
//! │  • TopicTree under RwLock    │  │  • publish → poll → check│
//! │  • additive merge            │  │  • one per topic         │
//! │  • segment frequency index   │  │  • cancellable           │
//! └──────────────────────────────┘  └──────────────────────────┘
//!                 ▲ merge                    │ publish / fetch
//!                 │                          ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Transport (backend)                      │
//! │  • fetch(prefix, depth, history, reason)                    │
//! │  • publish(topic, value) → "puback"                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use topic_cache::{ChangeController, FetchRequest, InMemoryTransport, PollPolicy, TopicCache, TopicRecord};
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = Arc::new(InMemoryTransport::new());
//!     transport.seed(vec![TopicRecord::new("house/living/light/set", "off")]);
//!
//!     let cache = TopicCache::new();
//!     cache.refresh(transport.as_ref(), &FetchRequest::new("house").with_depth(3)).await.unwrap();
//!
//!     let controller = ChangeController::new(cache.clone(), transport);
//!     let confirmed = controller
//!         .change("house/living/light/set", "on", PollPolicy::standard())
//!         .await
//!         .unwrap();
//!     assert!(confirmed);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`topic`]: paths, records, nodes and the [`TopicTree`]
//! - [`cache`]: the shared [`TopicCache`] handle
//! - [`change`]: the [`ChangeController`] and [`PollPolicy`]
//! - [`transport`]: the backend [`Transport`] trait and an in-memory backend
//! - [`config`]: [`TopicCacheConfig`]
//! - [`metrics`]: `metrics`-crate instrumentation

pub mod cache;
pub mod change;
pub mod config;
pub mod metrics;
pub mod topic;
pub mod transport;

pub use cache::{FetchError, TopicCache, TopicSnapshot};
pub use change::{ChangeController, ChangeError, ConfirmationState, PollPolicy, SettledCallback};
pub use config::TopicCacheConfig;
pub use topic::{
    HistoryEntry, MergeSummary, Reason, TopicError, TopicNode, TopicPath, TopicRecord, TopicTree,
    TopicValue,
};
pub use transport::{FetchRequest, FetchResponse, InMemoryTransport, PublishResponse, Transport, TransportError};
