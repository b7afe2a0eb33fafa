// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! A single vertex of the topic tree.

use std::collections::BTreeMap;

use super::record::{HistoryEntry, Reason, TopicRecord, TopicValue};

/// Child segment that marks a topic as controllable.
pub const SET_SEGMENT: &str = "set";

/// One position in the topic tree.
///
/// Each node owns its children exclusively; algorithms always walk
/// top-down from the root, so there are no parent links. Children are kept
/// in a `BTreeMap` so traversal order is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicNode {
    /// Child segment -> child node
    pub(crate) children: BTreeMap<String, TopicNode>,
    /// Full path of this node, without a leading slash (empty for the root)
    pub topic: String,
    /// Last known value
    pub value: Option<TopicValue>,
    /// Timestamp of the last value
    pub time: Option<String>,
    /// Provenance chain of the last value
    pub reason: Option<Vec<Reason>>,
    /// Prior values, as sent upstream
    pub history: Option<Vec<HistoryEntry>>,
}

impl TopicNode {
    pub(crate) fn new(topic: String) -> Self {
        Self {
            topic,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    #[must_use]
    pub fn child(&self, segment: &str) -> Option<&TopicNode> {
        self.children.get(segment)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &TopicNode)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Child segment names, sorted.
    #[must_use]
    pub fn child_names(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    /// True if the node has a `set` child; changes are published there.
    #[must_use]
    pub fn is_updatable(&self) -> bool {
        self.children.contains_key(SET_SEGMENT)
    }

    /// Value coerced to a string, as used for change confirmation.
    #[must_use]
    pub fn value_string(&self) -> Option<String> {
        self.value.as_ref().map(ToString::to_string)
    }

    /// Merge an incoming record into this node.
    ///
    /// Only fields the record carries are written; nothing is reset to
    /// `None`. In particular an update without `history` keeps the old one.
    pub fn merge(&mut self, record: &TopicRecord) {
        if let Some(value) = &record.value {
            self.value = Some(value.clone());
        }
        if let Some(time) = &record.time {
            self.time = Some(time.clone());
        }
        if let Some(reason) = &record.reason {
            self.reason = Some(reason.clone());
        }
        if let Some(history) = &record.history {
            self.history = Some(history.clone());
        }
    }
}
