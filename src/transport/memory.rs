use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{FetchRequest, FetchResponse, PublishResponse, Transport, TransportError, STATUS_OK};
use crate::topic::{TopicPath, TopicRecord, TopicValue};

/// In-process backend holding one record per topic.
///
/// Publishes are applied immediately and acknowledged with `puback`
/// unless nack mode is on. Useful for demos and tests.
pub struct InMemoryTransport {
    data: DashMap<String, TopicRecord>,
    ack_publishes: AtomicBool,
    fetch_status: AtomicU16,
    fetch_calls: AtomicU64,
    publish_calls: AtomicU64,
}

impl InMemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            ack_publishes: AtomicBool::new(true),
            fetch_status: AtomicU16::new(STATUS_OK),
            fetch_calls: AtomicU64::new(0),
            publish_calls: AtomicU64::new(0),
        }
    }

    /// Store records as the backend's current state.
    pub fn seed(&self, records: impl IntoIterator<Item = TopicRecord>) {
        for mut record in records {
            let Some(topic) = record.topic.as_deref() else {
                continue;
            };
            let key = TopicPath::parse(topic).to_string();
            record.topic = Some(key.clone());
            self.data.insert(key, record);
        }
    }

    /// Answer publishes with a non-ack body instead of applying them.
    pub fn set_nack(&self, nack: bool) {
        self.ack_publishes.store(!nack, Ordering::SeqCst);
    }

    /// Status returned by subsequent fetches; non-200 carries no payload.
    pub fn set_fetch_status(&self, status: u16) {
        self.fetch_status.store(status, Ordering::SeqCst);
    }

    #[must_use]
    pub fn fetch_calls(&self) -> u64 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn publish_calls(&self) -> u64 {
        self.publish_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn select(&self, request: &FetchRequest) -> Vec<TopicRecord> {
        let prefix = TopicPath::parse(&request.topic);
        let mut records: Vec<TopicRecord> = self
            .data
            .iter()
            .filter(|entry| {
                let path = TopicPath::parse(entry.key());
                is_within(&prefix, &path, request.depth)
            })
            .map(|entry| {
                let mut record = entry.value().clone();
                if !request.history {
                    record.history = None;
                }
                if !request.reason {
                    record.reason = None;
                }
                record
            })
            .collect();
        records.sort_by(|a, b| a.topic.cmp(&b.topic));
        records
    }
}

/// `path` equals `prefix` or lies at most `depth` levels below it.
fn is_within(prefix: &TopicPath, path: &TopicPath, depth: u32) -> bool {
    path.len() >= prefix.len()
        && path.len() - prefix.len() <= depth as usize
        && path.segments()[..prefix.len()] == *prefix.segments()
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let status = self.fetch_status.load(Ordering::SeqCst);
        if status != STATUS_OK {
            return Ok(FetchResponse::error(status));
        }
        Ok(FetchResponse::ok(self.select(request)))
    }

    async fn publish(&self, topic: &str, value: &str) -> Result<PublishResponse, TransportError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        if !self.ack_publishes.load(Ordering::SeqCst) {
            return Ok(PublishResponse {
                status: STATUS_OK,
                body: "rejected".to_string(),
            });
        }
        let key = TopicPath::parse(topic).to_string();
        self.data
            .entry(key.clone())
            .and_modify(|record| record.value = Some(TopicValue::from(value)))
            .or_insert_with(|| TopicRecord::new(key, value));
        Ok(PublishResponse::puback())
    }
}
