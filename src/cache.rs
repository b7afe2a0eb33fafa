// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Shared handle over the topic tree.
//!
//! [`TopicCache`] is what views and the change controller hold. It is cheap
//! to clone and guards a single [`TopicTree`] with a read-write lock. Reads
//! hand out owned [`TopicSnapshot`]s so no lock outlives a call.
//!
//! # Example
//!
//! ```
//! use topic_cache::{TopicCache, TopicRecord};
//!
//! let cache = TopicCache::new();
//! cache.merge_records(&[
//!     TopicRecord::new("house/living/light", "on"),
//!     TopicRecord::new("house/kitchen/light", "off"),
//! ]);
//!
//! let lights = cache.get_matches("house/%/light");
//! assert_eq!(lights.len(), 2);
//! assert_eq!(cache.get_node("/house/living/light").unwrap().value_string().as_deref(), Some("on"));
//! assert_eq!(cache.word_frequency("light"), 2);
//! ```

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::TopicCacheConfig;
use crate::metrics;
use crate::topic::{HistoryEntry, MergeSummary, Reason, TopicNode, TopicRecord, TopicTree, TopicValue};
use crate::transport::{FetchRequest, FetchResponse, Transport, TransportError, STATUS_OK};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Fetch returned status {0}")]
    Status(u16),
    #[error("Fetch returned no payload")]
    MissingPayload,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Owned copy of one node, without its subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicSnapshot {
    pub topic: String,
    pub value: Option<TopicValue>,
    pub time: Option<String>,
    pub reason: Option<Vec<Reason>>,
    pub history: Option<Vec<HistoryEntry>>,
    /// Child segment names, sorted
    pub children: Vec<String>,
}

impl TopicSnapshot {
    pub fn value_string(&self) -> Option<String> {
        self.value.as_ref().map(ToString::to_string)
    }

    pub fn is_updatable(&self) -> bool {
        self.children.iter().any(|c| c == crate::topic::SET_SEGMENT)
    }
}

impl From<&TopicNode> for TopicSnapshot {
    fn from(node: &TopicNode) -> Self {
        Self {
            topic: node.topic.clone(),
            value: node.value.clone(),
            time: node.time.clone(),
            reason: node.reason.clone(),
            history: node.history.clone(),
            children: node.child_names(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TopicCache {
    tree: Arc<RwLock<TopicTree>>,
}

impl TopicCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the tree for a batch of reads.
    ///
    /// Hold the guard briefly; merges block while it is alive.
    pub fn read(&self) -> RwLockReadGuard<'_, TopicTree> {
        self.tree.read()
    }

    pub fn get_node(&self, topic: &str) -> Option<TopicSnapshot> {
        self.tree.read().get_exact(topic).map(TopicSnapshot::from)
    }

    pub fn get_matches(&self, pattern: &str) -> Vec<TopicSnapshot> {
        self.tree
            .read()
            .get_all_matching(pattern)
            .into_iter()
            .map(TopicSnapshot::from)
            .collect()
    }

    pub fn value_string(&self, topic: &str) -> Option<String> {
        self.tree.read().value_string(topic)
    }

    pub fn word_frequency(&self, segment: &str) -> usize {
        self.tree.read().word_frequency(segment)
    }

    pub fn is_empty(&self) -> bool {
        self.tree.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.tree.read().len()
    }

    /// Merge records in order under one write lock.
    pub fn merge_records(&self, records: &[TopicRecord]) -> MergeSummary {
        self.tree.write().merge_all(records)
    }

    /// Merge a fetch result if it is a success; otherwise leave the tree alone.
    pub fn merge_fetch_response(&self, response: &FetchResponse) -> Result<MergeSummary, FetchError> {
        merge_checked(&mut self.tree.write(), response)
    }

    /// One fetch-and-merge cycle. Scheduling is up to the caller.
    #[instrument(skip(self, transport, request), fields(topic = %request.topic, depth = request.depth))]
    pub async fn refresh(
        &self,
        transport: &dyn Transport,
        request: &FetchRequest,
    ) -> Result<MergeSummary, FetchError> {
        let response = match transport.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Fetch failed");
                metrics::record_fetch_failure(None);
                return Err(e.into());
            }
        };
        self.merge_fetch_response(&response)
    }

    /// [`refresh`](Self::refresh) with the request built from `config`'s
    /// refresh depth and flags.
    pub async fn refresh_topic(
        &self,
        transport: &dyn Transport,
        topic: &str,
        config: &TopicCacheConfig,
    ) -> Result<MergeSummary, FetchError> {
        self.refresh(transport, &FetchRequest::refresh(topic, config)).await
    }

    /// Merge a confirmation fetch and read back one topic's value, with no
    /// other mutation in between.
    pub(crate) fn merge_and_read(
        &self,
        response: Result<FetchResponse, TransportError>,
        topic: &str,
    ) -> Option<TopicValue> {
        let mut tree = self.tree.write();
        match response {
            Ok(response) => match merge_checked(&mut tree, &response) {
                Ok(summary) => debug!(topic, applied = summary.applied, "Confirmation fetch merged"),
                Err(e) => debug!(topic, error = %e, "Confirmation fetch not merged"),
            },
            Err(e) => {
                warn!(topic, error = %e, "Confirmation fetch failed");
                metrics::record_fetch_failure(None);
            }
        }
        tree.get_exact(topic).and_then(|node| node.value.clone())
    }
}

fn merge_checked(tree: &mut TopicTree, response: &FetchResponse) -> Result<MergeSummary, FetchError> {
    if response.status != STATUS_OK {
        warn!(status = response.status, "Fetch returned an error status, cache unchanged");
        metrics::record_fetch_failure(Some(response.status));
        return Err(FetchError::Status(response.status));
    }
    let Some(records) = response.records() else {
        warn!("Fetch returned no payload, cache unchanged");
        metrics::record_fetch_failure(Some(response.status));
        return Err(FetchError::MissingPayload);
    };
    let summary = tree.merge_all(records);
    debug!(applied = summary.applied, "Fetch merged");
    Ok(summary)
}
