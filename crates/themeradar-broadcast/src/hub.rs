//! In-process pub/sub hub backed by `tokio::sync::broadcast`.
//!
//! One shared topic carries every change event for live subscribers (the
//! SSE stream), plus lazily created per-user channels for direct alert
//! delivery. Publishing is always best-effort: an event nobody is
//! listening for is dropped, never an error.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// What kind of change an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NewTheme,
    ThemeUpdate,
    TrendData,
    Alert,
    Notification,
}

impl EventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::NewTheme => "new_theme",
            EventKind::ThemeUpdate => "theme_update",
            EventKind::TrendData => "trend_data",
            EventKind::Alert => "alert",
            EventKind::Notification => "notification",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed event on the hub.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastEvent {
    pub kind: EventKind,
    /// JSON mirror of the relevant entity fields.
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl BroadcastEvent {
    #[must_use]
    pub fn new(kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// The shared topic plus per-user direct channels.
#[derive(Debug)]
pub struct BroadcastHub {
    topic: broadcast::Sender<BroadcastEvent>,
    capacity: usize,
    users: Mutex<HashMap<i64, broadcast::Sender<BroadcastEvent>>>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (topic, _) = broadcast::channel(capacity.max(1));
        Self {
            topic,
            capacity: capacity.max(1),
            users: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribes to the shared topic.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.topic.subscribe()
    }

    /// Subscribes to one user's direct channel, creating it on first use.
    #[must_use]
    pub fn subscribe_user(&self, user_id: i64) -> broadcast::Receiver<BroadcastEvent> {
        let mut users = self.users.lock().expect("hub mutex poisoned");
        users
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publishes on the shared topic. Returns the number of live receivers.
    pub fn publish(&self, event: BroadcastEvent) -> usize {
        match self.topic.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!("topic event dropped: no subscribers");
                0
            }
        }
    }

    /// Publishes on one user's direct channel. Returns whether anyone was
    /// listening; `false` is a normal outcome, not a failure.
    pub fn publish_to_user(&self, user_id: i64, event: BroadcastEvent) -> bool {
        let sender = {
            let users = self.users.lock().expect("hub mutex poisoned");
            users.get(&user_id).cloned()
        };
        match sender {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind) -> BroadcastEvent {
        BroadcastEvent::new(kind, serde_json::json!({"theme_id": 1}))
    }

    #[tokio::test]
    async fn topic_subscribers_receive_published_events() {
        let hub = BroadcastHub::new(16);
        let mut rx = hub.subscribe();

        let receivers = hub.publish(event(EventKind::NewTheme));
        assert_eq!(receivers, 1);

        let received = rx.recv().await.expect("event");
        assert_eq!(received.kind, EventKind::NewTheme);
        assert_eq!(received.payload["theme_id"], 1);
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_a_no_op() {
        let hub = BroadcastHub::new(16);
        assert_eq!(hub.publish(event(EventKind::TrendData)), 0);
    }

    #[tokio::test]
    async fn user_channels_are_isolated() {
        let hub = BroadcastHub::new(16);
        let mut alice = hub.subscribe_user(1);
        let mut bob = hub.subscribe_user(2);

        assert!(hub.publish_to_user(1, event(EventKind::Alert)));

        let received = alice.recv().await.expect("event");
        assert_eq!(received.kind, EventKind::Alert);
        assert!(
            matches!(bob.try_recv(), Err(broadcast::error::TryRecvError::Empty)),
            "event must not leak to another user's channel"
        );
    }

    #[tokio::test]
    async fn direct_publish_to_unknown_user_reports_no_listener() {
        let hub = BroadcastHub::new(16);
        assert!(!hub.publish_to_user(42, event(EventKind::Alert)));
    }

    #[test]
    fn events_serialize_with_snake_case_kinds() {
        let json = serde_json::to_value(event(EventKind::ThemeUpdate)).expect("serialize");
        assert_eq!(json["kind"], "theme_update");
        assert!(json["timestamp"].is_string());
    }
}
