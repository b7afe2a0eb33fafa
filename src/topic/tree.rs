// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Hierarchical topic cache.
//!
//! ```text
//! living/light/set       root
//! living/light           └── living
//! living/temp                ├── light ── set
//!                            └── temp
//! ```
//!
//! The tree only grows: nodes are created on first insert along a path and
//! are never removed. Every node stores its full topic at creation time.

use std::collections::btree_map::Entry;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::node::TopicNode;
use super::path::{join_topic, TopicError, TopicPath, MULTI_LEVEL_WILDCARD, SINGLE_LEVEL_WILDCARD};
use super::record::TopicRecord;
use crate::metrics;

/// Outcome of a batch merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Records merged into the tree
    pub applied: usize,
    /// Records dropped (no topic, or a topic that cannot be stored)
    pub skipped: usize,
}

/// The topic tree: a sentinel root plus a segment-frequency index.
#[derive(Debug, Default)]
pub struct TopicTree {
    root: TopicNode,
    /// Segment -> number of tree positions where it was first created
    word_count: HashMap<String, usize>,
    /// Nodes below the root
    node_count: usize,
}

impl TopicTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff nothing has been learned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.root.has_children()
    }

    /// Number of nodes, excluding the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.node_count
    }

    #[must_use]
    pub fn root(&self) -> &TopicNode {
        &self.root
    }

    /// Insert or update a topic.
    ///
    /// Missing intermediate nodes are created and registered in the
    /// frequency index, then the record is merged into the terminal node.
    /// Paths containing a literal `%` / `#` segment or an empty segment are
    /// rejected and leave the tree untouched.
    pub fn upsert(&mut self, topic: &str, record: &TopicRecord) -> Result<&TopicNode, TopicError> {
        let path = TopicPath::parse_for_storage(topic)?;
        let mut node = &mut self.root;
        for segment in path.segments() {
            let parent = node;
            node = match parent.children.entry(segment.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    *self.word_count.entry(segment.clone()).or_default() += 1;
                    self.node_count += 1;
                    entry.insert(TopicNode::new(join_topic(&parent.topic, segment)))
                }
            };
        }
        node.merge(record);
        Ok(node)
    }

    /// Apply records in order; later records win for the same topic.
    pub fn merge_all(&mut self, records: &[TopicRecord]) -> MergeSummary {
        let mut summary = MergeSummary::default();
        for record in records {
            let Some(topic) = record.topic.as_deref() else {
                summary.skipped += 1;
                continue;
            };
            match self.upsert(topic, record) {
                Ok(_) => summary.applied += 1,
                Err(e) => {
                    warn!(topic, error = %e, "Dropping record with unstorable topic");
                    summary.skipped += 1;
                }
            }
        }
        debug!(applied = summary.applied, skipped = summary.skipped, "Merged records");
        metrics::record_merge(summary.applied, summary.skipped);
        metrics::set_node_count(self.node_count);
        summary
    }

    /// Exact lookup. Read-only; never creates nodes.
    ///
    /// The empty topic resolves to the root sentinel.
    #[must_use]
    pub fn get_exact(&self, topic: &str) -> Option<&TopicNode> {
        self.get_by_segments(TopicPath::parse(topic).segments())
    }

    pub fn get_by_segments<S: AsRef<str>>(&self, segments: &[S]) -> Option<&TopicNode> {
        let mut node = &self.root;
        for segment in segments {
            node = node.children.get(segment.as_ref())?;
        }
        Some(node)
    }

    /// All nodes matching a pattern with optional `%` / `#` wildcards.
    ///
    /// - `%` consumes exactly one level
    /// - `#` does not advance; it keeps descending until a childless node
    ///   is reached, and that leaf matches
    ///
    /// An empty tree has no leaves, so `#` never yields the root.
    #[must_use]
    pub fn get_all_matching(&self, pattern: &str) -> Vec<&TopicNode> {
        let pattern = TopicPath::parse(pattern);
        let mut matches = Vec::new();
        collect_matches(&self.root, pattern.segments(), &mut matches);
        matches
    }

    /// How many distinct tree positions introduced `segment`.
    #[must_use]
    pub fn word_frequency(&self, segment: &str) -> usize {
        self.word_count.get(segment).copied().unwrap_or(0)
    }

    /// Stored value of a topic, coerced to a string.
    #[must_use]
    pub fn value_string(&self, topic: &str) -> Option<String> {
        self.get_exact(topic).and_then(TopicNode::value_string)
    }

    /// Count positions in the subtree at `at` that spell `name` as a
    /// descending (not necessarily contiguous) chain of segments.
    ///
    /// Stops early once `cutoff` occurrences are found; callers usually only
    /// need to know whether a name is unique (`cutoff = 2`).
    #[must_use]
    pub fn count_name_occurrences(&self, name: &[&str], at: &str, cutoff: usize) -> usize {
        match self.get_exact(at) {
            Some(node) => count_name_rec(name, node, cutoff),
            None => 0,
        }
    }
}

fn collect_matches<'a, S: AsRef<str>>(node: &'a TopicNode, pattern: &[S], out: &mut Vec<&'a TopicNode>) {
    let Some((head, rest)) = pattern.split_first() else {
        out.push(node);
        return;
    };
    match head.as_ref() {
        MULTI_LEVEL_WILDCARD => {
            if !node.has_children() {
                if !node.topic.is_empty() {
                    out.push(node);
                }
                return;
            }
            for child in node.children.values() {
                collect_matches(child, pattern, out);
            }
        }
        SINGLE_LEVEL_WILDCARD => {
            for child in node.children.values() {
                collect_matches(child, rest, out);
            }
        }
        literal => {
            if let Some(child) = node.children.get(literal) {
                collect_matches(child, rest, out);
            }
        }
    }
}

fn count_name_rec(name: &[&str], node: &TopicNode, cutoff: usize) -> usize {
    let Some((first, rest)) = name.split_first() else {
        return 1;
    };
    let mut found = 0;
    for (segment, child) in node.children() {
        if segment == *first {
            found += count_name_rec(rest, child, cutoff);
        } else {
            found += count_name_rec(name, child, cutoff);
        }
        if found >= cutoff {
            break;
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::record::HistoryEntry;

    fn tree_with(topics: &[&str]) -> TopicTree {
        let mut tree = TopicTree::new();
        for topic in topics {
            tree.upsert(topic, &TopicRecord::new(*topic, "v")).unwrap();
        }
        tree
    }

    fn topics(nodes: &[&TopicNode]) -> Vec<String> {
        nodes.iter().map(|n| n.topic.clone()).collect()
    }

    #[test]
    fn test_new_tree_is_empty() {
        let tree = TopicTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn test_upsert_creates_intermediate_nodes() {
        let tree = tree_with(&["a/b/c"]);
        assert!(!tree.is_empty());
        assert_eq!(tree.len(), 3);
        let b = tree.get_exact("a/b").unwrap();
        assert_eq!(b.topic, "a/b");
        assert!(b.value.is_none());
        assert_eq!(tree.value_string("a/b/c").as_deref(), Some("v"));
    }

    #[test]
    fn test_leading_slash_same_node() {
        let mut tree = TopicTree::new();
        tree.upsert("/a/b", &TopicRecord::new("/a/b", "1")).unwrap();
        tree.upsert("a/b", &TopicRecord::new("a/b", "2")).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.value_string("/a/b").as_deref(), Some("2"));
        assert!(std::ptr::eq(
            tree.get_exact("/a/b").unwrap(),
            tree.get_exact("a/b").unwrap()
        ));
    }

    #[test]
    fn test_get_exact_miss_does_not_create() {
        let tree = tree_with(&["a/b"]);
        assert!(tree.get_exact("a/x").is_none());
        assert!(tree.get_exact("a/b/c").is_none());
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_upsert_rejects_reserved_segments() {
        let mut tree = TopicTree::new();
        assert!(tree.upsert("a/%", &TopicRecord::default()).is_err());
        assert!(tree.upsert("#", &TopicRecord::default()).is_err());
        assert!(tree.upsert("a//b", &TopicRecord::default()).is_err());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_word_frequency_counts_distinct_positions() {
        let mut tree = tree_with(&["a/light", "b/light", "a/light/set"]);
        assert_eq!(tree.word_frequency("light"), 2);
        assert_eq!(tree.word_frequency("set"), 1);
        assert_eq!(tree.word_frequency("nope"), 0);

        tree.upsert("a/light", &TopicRecord::new("a/light", "x")).unwrap();
        assert_eq!(tree.word_frequency("light"), 2);
    }

    #[test]
    fn test_history_preserved_across_sparse_update() {
        let mut tree = TopicTree::new();
        let history = vec![HistoryEntry { value: Some("0".into()), ..Default::default() }];
        tree.upsert("t", &TopicRecord::new("t", "1").with_history(history.clone())).unwrap();
        tree.upsert("t", &TopicRecord::new("t", "2")).unwrap();
        let node = tree.get_exact("t").unwrap();
        assert_eq!(node.history, Some(history));
        assert_eq!(node.value_string().as_deref(), Some("2"));
    }

    #[test]
    fn test_single_level_wildcard() {
        let tree = tree_with(&["a/b/c", "a/x/c"]);
        assert_eq!(topics(&tree.get_all_matching("a/%/c")), vec!["a/b/c", "a/x/c"]);
        // `%` consumes exactly one level: `a/%` stops at b and x and never
        // reaches the c nodes
        let shallow = topics(&tree.get_all_matching("a/%"));
        assert_eq!(shallow, vec!["a/b", "a/x"]);
        assert!(!shallow.iter().any(|t| t.ends_with("/c")));
        assert!(tree.get_all_matching("a/%/c/%").is_empty());
    }

    #[test]
    fn test_multi_level_wildcard_resolves_to_leaf() {
        let tree = tree_with(&["a/b/c"]);
        assert_eq!(topics(&tree.get_all_matching("a/#")), vec!["a/b/c"]);
        assert_eq!(topics(&tree.get_all_matching("#")), vec!["a/b/c"]);
    }

    #[test]
    fn test_multi_level_wildcard_on_leaf_matches_itself() {
        let tree = tree_with(&["a/b"]);
        assert_eq!(topics(&tree.get_all_matching("a/b/#")), vec!["a/b"]);
    }

    #[test]
    fn test_multi_level_wildcard_with_trailing_segments() {
        let tree = tree_with(&["a/b/c", "a/d"]);
        // Leaves match regardless of what follows `#`
        assert_eq!(topics(&tree.get_all_matching("a/#/zzz")), vec!["a/b/c", "a/d"]);
    }

    #[test]
    fn test_multi_level_wildcard_on_empty_tree() {
        let tree = TopicTree::new();
        assert!(tree.get_all_matching("#").is_empty());
    }

    #[test]
    fn test_literal_miss_is_empty() {
        let tree = tree_with(&["a/b"]);
        assert!(tree.get_all_matching("z/%").is_empty());
        assert!(tree.get_all_matching("a/b/c").is_empty());
        assert_eq!(topics(&tree.get_all_matching("/a/b")), vec!["a/b"]);
    }

    #[test]
    fn test_merge_all_orders_and_skips() {
        let mut tree = TopicTree::new();
        let records = vec![
            TopicRecord::new("a", "1"),
            TopicRecord { topic: None, value: Some("x".into()), ..Default::default() },
            TopicRecord::new("a/%", "bad"),
            TopicRecord::new("a", "2"),
        ];
        let summary = tree.merge_all(&records);
        assert_eq!(summary, MergeSummary { applied: 2, skipped: 2 });
        assert_eq!(tree.value_string("a").as_deref(), Some("2"));
    }

    #[test]
    fn test_count_name_occurrences() {
        let tree = tree_with(&[
            "house/living/light",
            "house/kitchen/light",
            "house/kitchen/ceiling/light",
            "house/bath/fan",
        ]);
        assert_eq!(tree.count_name_occurrences(&["fan"], "", 2), 1);
        assert_eq!(tree.count_name_occurrences(&["light"], "", 10), 3);
        assert_eq!(tree.count_name_occurrences(&["light"], "", 2), 2);
        assert_eq!(tree.count_name_occurrences(&["living", "light"], "", 2), 1);
        assert_eq!(tree.count_name_occurrences(&["light"], "house/kitchen", 10), 2);
        assert_eq!(tree.count_name_occurrences(&["light"], "nowhere", 10), 0);
    }
}
