// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Publish, then poll until the cache shows the new value.
//!
//! # Lifecycle
//!
//! ```text
//! request_change ─► Publishing ──ack──► Polling ──match──► Confirmed  on_settled(true)
//!                       │                  │
//!                   nack/error        budget spent ──────► Failed     on_settled(false)
//!
//! cancel / cancel_all (any state) ───────────────────────► Cancelled  (no callback)
//! ```
//!
//! One confirmation runs per topic. Each runs as its own task; the pending
//! map entry is the guard. Settlement and cancellation both remove that
//! entry, and only the side that removes it acts, so a callback never fires
//! after `cancel` has returned.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::policy::PollPolicy;
use crate::cache::TopicCache;
use crate::config::TopicCacheConfig;
use crate::metrics;
use crate::topic::{TopicError, TopicPath};
use crate::transport::{FetchRequest, Transport};

/// Settlement callback: `true` once the new value is observed.
pub type SettledCallback = Box<dyn FnOnce(bool) + Send + 'static>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChangeError {
    #[error("A change for '{0}' is already being confirmed")]
    AlreadyPending(String),
    #[error("Invalid change topic: {0}")]
    InvalidTopic(#[from] TopicError),
    #[error("Poll budget must allow at least one poll")]
    ZeroPollBudget,
    #[error("Confirmation for '{0}' was cancelled")]
    Cancelled(String),
    #[error("No tokio runtime to run the confirmation on")]
    NoRuntime,
}

/// Where an active confirmation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationState {
    /// Waiting for the publish acknowledgement
    Publishing,
    /// Waiting for, or running, poll number `attempt` (1-based)
    Polling { attempt: u32 },
}

impl fmt::Display for ConfirmationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publishing => write!(f, "Publishing"),
            Self::Polling { attempt } => write!(f, "Polling({})", attempt),
        }
    }
}

struct PendingChange {
    id: u64,
    expected: String,
    state: ConfirmationState,
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl PendingChange {
    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Inner {
    cache: TopicCache,
    transport: Arc<dyn Transport>,
    config: TopicCacheConfig,
    pending: DashMap<String, PendingChange>,
    next_id: AtomicU64,
}

/// Drives write-then-verify changes against a polled cache.
///
/// Requires a tokio runtime: each accepted request spawns a task. Requests
/// made outside one fail with [`ChangeError::NoRuntime`].
#[derive(Clone)]
pub struct ChangeController {
    inner: Arc<Inner>,
}

impl ChangeController {
    pub fn new(cache: TopicCache, transport: Arc<dyn Transport>) -> Self {
        Self::with_config(cache, transport, TopicCacheConfig::default())
    }

    pub fn with_config(cache: TopicCache, transport: Arc<dyn Transport>, config: TopicCacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                transport,
                config,
                pending: DashMap::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn cache(&self) -> &TopicCache {
        &self.inner.cache
    }

    /// Poll budget from the configuration.
    pub fn default_policy(&self) -> PollPolicy {
        PollPolicy::from_config(&self.inner.config)
    }

    /// Publish `value` to `topic` and confirm it by polling.
    ///
    /// Returns immediately. `on_settled` runs exactly once with the outcome,
    /// unless the confirmation is cancelled first, in which case it never
    /// runs. A second request for a topic that is still being confirmed is
    /// rejected with [`ChangeError::AlreadyPending`] and leaves the first one
    /// untouched.
    pub fn request_change<F>(
        &self,
        topic: &str,
        value: impl Into<String>,
        policy: PollPolicy,
        on_settled: F,
    ) -> Result<(), ChangeError>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        if policy.max_polls == 0 {
            return Err(ChangeError::ZeroPollBudget);
        }
        let key = TopicPath::parse_for_storage(topic)?.to_string();
        let runtime = Handle::try_current().map_err(|_| ChangeError::NoRuntime)?;
        let expected = value.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));

        match self.inner.pending.entry(key.clone()) {
            Entry::Occupied(_) => {
                warn!(topic = %key, "Change already pending, request rejected");
                return Err(ChangeError::AlreadyPending(key));
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingChange {
                    id,
                    expected: expected.clone(),
                    state: ConfirmationState::Publishing,
                    cancelled: Arc::clone(&cancelled),
                    task: None,
                });
            }
        }
        metrics::set_pending_confirmations(self.inner.pending.len());
        debug!(topic = %key, value = %expected, max_polls = policy.max_polls, "Change requested");

        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let on_settled: SettledCallback = Box::new(on_settled);
        let handle = runtime.spawn(async move {
            inner
                .run(task_key, id, expected, policy, cancelled, on_settled)
                .await;
        });

        // The task may already be gone (settled or cancelled); then the
        // handle is simply dropped.
        if let Some(mut entry) = self.inner.pending.get_mut(&key) {
            if entry.id == id {
                entry.task = Some(handle);
            }
        }
        Ok(())
    }

    /// [`request_change`](Self::request_change) and wait for the outcome.
    pub async fn change(
        &self,
        topic: &str,
        value: impl Into<String>,
        policy: PollPolicy,
    ) -> Result<bool, ChangeError> {
        let (tx, rx) = oneshot::channel();
        self.request_change(topic, value, policy, move |confirmed| {
            let _ = tx.send(confirmed);
        })?;
        rx.await
            .map_err(|_| ChangeError::Cancelled(TopicPath::parse(topic).to_string()))
    }

    /// True while a confirmation for `topic` is active.
    pub fn is_pending(&self, topic: &str) -> bool {
        self.inner.pending.contains_key(&TopicPath::parse(topic).to_string())
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn state(&self, topic: &str) -> Option<ConfirmationState> {
        self.inner
            .pending
            .get(&TopicPath::parse(topic).to_string())
            .map(|p| p.state)
    }

    /// Value an active confirmation is waiting for.
    pub fn expected_value(&self, topic: &str) -> Option<String> {
        self.inner
            .pending
            .get(&TopicPath::parse(topic).to_string())
            .map(|p| p.expected.clone())
    }

    /// Cancel one confirmation without invoking its callback.
    pub fn cancel(&self, topic: &str) -> bool {
        let key = TopicPath::parse(topic).to_string();
        let Some((_, mut pending)) = self.inner.pending.remove(&key) else {
            return false;
        };
        pending.cancel();
        info!(topic = %key, state = %pending.state, "Change confirmation cancelled");
        metrics::record_confirmation("cancelled");
        metrics::set_pending_confirmations(self.inner.pending.len());
        true
    }

    /// Cancel every confirmation without invoking callbacks.
    ///
    /// Used when the owning view goes away. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut count = 0;
        self.inner.pending.retain(|_, pending| {
            pending.cancel();
            count += 1;
            false
        });
        if count > 0 {
            info!(count, "Cancelled all change confirmations");
            for _ in 0..count {
                metrics::record_confirmation("cancelled");
            }
        }
        metrics::set_pending_confirmations(0);
        count
    }
}

impl Inner {
    #[instrument(skip_all, fields(topic = %key, id))]
    async fn run(
        self: Arc<Self>,
        key: String,
        id: u64,
        expected: String,
        policy: PollPolicy,
        cancelled: Arc<AtomicBool>,
        on_settled: SettledCallback,
    ) {
        let started = Instant::now();
        let Some(confirmed) = self.confirm(&key, id, &expected, &policy, &cancelled).await else {
            debug!("Confirmation stopped by cancellation");
            return;
        };
        if !self.settle(&key, id) {
            debug!("Confirmation cancelled before settlement");
            return;
        }

        metrics::record_confirmation_latency(started.elapsed());
        if confirmed {
            info!(value = %expected, "Change confirmed");
            metrics::record_confirmation("confirmed");
        } else {
            warn!(value = %expected, "Change not confirmed");
            metrics::record_confirmation("failed");
        }
        on_settled(confirmed);
    }

    /// `None` if cancelled, otherwise whether the value was observed.
    async fn confirm(
        &self,
        key: &str,
        id: u64,
        expected: &str,
        policy: &PollPolicy,
        cancelled: &AtomicBool,
    ) -> Option<bool> {
        let acknowledged = match self.transport.publish(key, expected).await {
            Ok(response) if response.is_ack() => true,
            Ok(response) => {
                warn!(status = response.status, body = %response.body, "Publish not acknowledged");
                false
            }
            Err(e) => {
                warn!(error = %e, "Publish failed");
                false
            }
        };
        if cancelled.load(Ordering::SeqCst) {
            return None;
        }
        if !acknowledged {
            return Some(false);
        }

        let request = FetchRequest::confirmation(key, &self.config);
        for attempt in 1..=policy.max_polls {
            self.set_state(key, id, ConfirmationState::Polling { attempt });
            tokio::time::sleep(policy.interval).await;
            if cancelled.load(Ordering::SeqCst) {
                return None;
            }
            let response = self.transport.fetch(&request).await;
            if cancelled.load(Ordering::SeqCst) {
                return None;
            }
            metrics::record_poll();
            let observed = self.cache.merge_and_read(response, key);
            debug!(attempt, observed = ?observed, "Poll complete");
            if observed.is_some_and(|value| value.matches(expected)) {
                return Some(true);
            }
        }
        Some(false)
    }

    fn set_state(&self, key: &str, id: u64, state: ConfirmationState) {
        if let Some(mut pending) = self.pending.get_mut(key) {
            if pending.id == id {
                pending.state = state;
            }
        }
    }

    /// Claim the pending entry. False if a cancellation got there first.
    fn settle(&self, key: &str, id: u64) -> bool {
        let claimed = self.pending.remove_if(key, |_, p| p.id == id).is_some();
        metrics::set_pending_confirmations(self.pending.len());
        claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::TopicRecord;
    use crate::transport::InMemoryTransport;
    use std::time::Duration;

    fn controller() -> (ChangeController, Arc<InMemoryTransport>) {
        let transport = Arc::new(InMemoryTransport::new());
        transport.seed(vec![TopicRecord::new("x/set", "off")]);
        let controller = ChangeController::new(TopicCache::new(), transport.clone());
        (controller, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_confirmed_on_first_poll() {
        let (controller, transport) = controller();
        let confirmed = controller.change("x/set", "on", PollPolicy::test()).await.unwrap();
        assert!(confirmed);
        assert_eq!(transport.publish_calls(), 1);
        assert_eq!(transport.fetch_calls(), 1);
        assert!(!controller.is_pending("x/set"));
        assert_eq!(controller.cache().value_string("x/set").as_deref(), Some("on"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_waits_one_interval() {
        let (controller, transport) = controller();
        controller
            .request_change("x/set", "on", PollPolicy::test(), |_| {})
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(transport.fetch_calls(), 0);
        assert_eq!(controller.state("x/set"), Some(ConfirmationState::Polling { attempt: 1 }));
        assert_eq!(controller.expected_value("x/set").as_deref(), Some("on"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nack_fails_without_polling() {
        let (controller, transport) = controller();
        transport.set_nack(true);
        let confirmed = controller.change("x/set", "on", PollPolicy::test()).await.unwrap();
        assert!(!confirmed);
        assert_eq!(transport.fetch_calls(), 0);
        assert!(!controller.is_pending("x/set"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_errors_consume_polls() {
        let (controller, transport) = controller();
        transport.set_fetch_status(500);
        let confirmed = controller.change("x/set", "on", PollPolicy::test()).await.unwrap();
        assert!(!confirmed);
        assert_eq!(transport.fetch_calls(), 3);
        assert!(controller.cache().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_invalid_requests() {
        let (controller, _) = controller();
        let zero = PollPolicy::new(0, Duration::from_millis(1));
        assert_eq!(
            controller.request_change("x/set", "on", zero, |_| {}),
            Err(ChangeError::ZeroPollBudget)
        );
        assert!(matches!(
            controller.request_change("x/#", "on", PollPolicy::test(), |_| {}),
            Err(ChangeError::InvalidTopic(_))
        ));
        assert_eq!(controller.pending_count(), 0);
    }

    #[test]
    fn test_request_outside_runtime_is_rejected() {
        let transport = Arc::new(InMemoryTransport::new());
        let controller = ChangeController::new(TopicCache::new(), transport.clone());
        assert_eq!(
            controller.request_change("x/set", "on", PollPolicy::test(), |_| {}),
            Err(ChangeError::NoRuntime)
        );
        assert!(!controller.is_pending("x/set"));
        assert_eq!(controller.pending_count(), 0);
        assert_eq!(transport.publish_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_whole_float_backend_confirms_integer_write() {
        let transport = Arc::new(FloatEcho::default());
        let controller = ChangeController::new(TopicCache::new(), transport.clone());
        let confirmed = controller
            .change("heater/target", "21", PollPolicy::test())
            .await
            .unwrap();
        assert!(confirmed);
        assert_eq!(transport.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(controller.cache().value_string("heater/target").as_deref(), Some("21"));
    }

    /// Backend that stores published numbers as floats, like a setpoint service.
    #[derive(Default)]
    struct FloatEcho {
        value: parking_lot::Mutex<f64>,
        fetches: AtomicU64,
    }

    #[async_trait::async_trait]
    impl Transport for FloatEcho {
        async fn fetch(
            &self,
            request: &FetchRequest,
        ) -> Result<crate::transport::FetchResponse, crate::transport::TransportError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let body = serde_json::json!({
                "payload": [{ "topic": request.topic, "value": *self.value.lock() }]
            });
            crate::transport::FetchResponse::from_body(200, body.to_string().as_bytes())
        }

        async fn publish(
            &self,
            _topic: &str,
            value: &str,
        ) -> Result<crate::transport::PublishResponse, crate::transport::TransportError> {
            let parsed = value
                .parse::<f64>()
                .map_err(|e| crate::transport::TransportError::Malformed(e.to_string()))?;
            *self.value.lock() = parsed;
            Ok(crate::transport::PublishResponse::puback())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_single_topic() {
        let (controller, _) = controller();
        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.change("x/set", "on", PollPolicy::test()).await })
        };
        while !controller.is_pending("x/set") {
            tokio::task::yield_now().await;
        }
        assert!(controller.is_pending("/x/set"));
        assert!(controller.cancel("/x/set"));
        assert!(!controller.cancel("x/set"));
        let result = waiter.await.unwrap();
        assert_eq!(result, Err(ChangeError::Cancelled("x/set".into())));
    }

    #[test]
    fn test_confirmation_state_display() {
        assert_eq!(ConfirmationState::Publishing.to_string(), "Publishing");
        assert_eq!(ConfirmationState::Polling { attempt: 2 }.to_string(), "Polling(2)");
    }
}
