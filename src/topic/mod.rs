// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Topic tree store.
//!
//! # Design
//!
//! Topics form a natural tree:
//!
//! ```text
//! house/living/light      root
//! house/living/temp       └── house
//! house/kitchen/light         ├── living
//!                             │   ├── light
//!                             │   └── temp
//!                             └── kitchen
//!                                 └── light
//! ```
//!
//! Lookups are exact ([`TopicTree::get_exact`]) or by pattern
//! ([`TopicTree::get_all_matching`]) with `%` (one level) and `#` (down to a
//! leaf). Updates merge field by field, see [`TopicNode::merge`].

mod node;
mod path;
mod record;
mod tree;

pub use node::{TopicNode, SET_SEGMENT};
pub use path::{TopicError, TopicPath, MULTI_LEVEL_WILDCARD, SEPARATOR, SINGLE_LEVEL_WILDCARD};
pub use record::{HistoryEntry, Reason, TopicRecord, TopicValue};
pub use tree::{MergeSummary, TopicTree};
