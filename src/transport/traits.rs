use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TopicCacheConfig;
use crate::topic::TopicRecord;

/// Acknowledgement body the backend sends for an accepted publish.
pub const PUBACK: &str = "puback";

/// HTTP-style success status.
pub const STATUS_OK: u16 = 200;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport connection error: {0}")]
    Connection(String),
    #[error("Malformed response body: {0}")]
    Malformed(String),
}

/// Request for a subtree of topic data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchRequest {
    /// Topic prefix, `/`-separated
    pub topic: String,
    /// Levels below the prefix to include (0 = the prefix only)
    pub depth: u32,
    /// Include history entries
    pub history: bool,
    /// Include reason chains
    pub reason: bool,
}

impl FetchRequest {
    /// Request for `topic` alone, reason included, no history.
    ///
    /// View routes use `|` instead of `/`; it is translated here.
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.replace('|', "/"),
            depth: 0,
            history: false,
            reason: true,
        }
    }

    #[must_use]
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: bool) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: bool) -> Self {
        self.reason = reason;
        self
    }

    /// Refresh cycle for `topic` with the configured depth and flags.
    pub fn refresh(topic: &str, config: &TopicCacheConfig) -> Self {
        Self::new(topic)
            .with_depth(config.refresh_depth)
            .with_history(config.refresh_history)
            .with_reason(config.refresh_reason)
    }

    /// Confirmation poll for one stored topic. The topic is used verbatim.
    pub fn confirmation(topic: &str, config: &TopicCacheConfig) -> Self {
        Self {
            topic: topic.to_string(),
            depth: config.confirm_depth,
            history: config.confirm_history,
            reason: config.confirm_reason,
        }
    }
}

/// Response to a fetch.
///
/// Success is `status == 200` with a payload present.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FetchResponse {
    #[serde(skip)]
    pub status: u16,
    #[serde(default)]
    pub payload: Option<Vec<TopicRecord>>,
}

impl FetchResponse {
    pub fn ok(records: Vec<TopicRecord>) -> Self {
        Self {
            status: STATUS_OK,
            payload: Some(records),
        }
    }

    pub fn error(status: u16) -> Self {
        Self {
            status,
            payload: None,
        }
    }

    /// Decode a `{"payload": [...]}` body received with `status`.
    pub fn from_body(status: u16, body: &[u8]) -> Result<Self, TransportError> {
        let mut response: FetchResponse = serde_json::from_slice(body)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        response.status = status;
        Ok(response)
    }

    /// Records if this response is mergeable.
    pub fn records(&self) -> Option<&[TopicRecord]> {
        match (&self.payload, self.status) {
            (Some(records), STATUS_OK) => Some(records),
            _ => None,
        }
    }
}

/// Response to a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResponse {
    pub status: u16,
    pub body: String,
}

impl PublishResponse {
    pub fn puback() -> Self {
        Self {
            status: STATUS_OK,
            body: PUBACK.to_string(),
        }
    }

    /// True iff the backend accepted the publish.
    pub fn is_ack(&self) -> bool {
        self.status == STATUS_OK && self.body == PUBACK
    }
}

/// Backend collaborator: pull topic subtrees, push single values.
///
/// Implementations return `Err` only for connection-level failures; a
/// reachable backend that refuses reports it through the status code.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError>;
    async fn publish(&self, topic: &str, value: &str) -> Result<PublishResponse, TransportError>;
}
