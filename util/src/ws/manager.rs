//! Topic-based broadcast hub with presence tracking.
//!
//! One Tokio broadcast channel per topic, created lazily on first subscription
//! and dropped once a send finds no receivers left. Delivery is best-effort per
//! receiver: a slow receiver observes `RecvError::Lagged` and skips ahead.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

type Topic = String;
type Sender = broadcast::Sender<String>;
type Receiver = broadcast::Receiver<String>;

#[derive(Clone)]
pub struct WebSocketManager {
    inner: Arc<RwLock<HashMap<Topic, Sender>>>,
    /// topic -> (profile id -> refcount); a user may hold several sockets.
    presence: Arc<RwLock<HashMap<Topic, HashMap<i64, usize>>>>,
    capacity: usize,
}

impl Default for WebSocketManager {
    fn default() -> Self {
        Self::with_capacity(crate::config::ws_channel_capacity())
    }
}

impl WebSocketManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager whose per-topic channels buffer `capacity` messages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::default(),
            presence: Arc::default(),
            capacity: capacity.max(1),
        }
    }

    /// Subscribes to `topic`, creating its channel if necessary.
    pub async fn subscribe(&self, topic: &str) -> Receiver {
        let mut map = self.inner.write().await;
        map.entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Broadcasts `msg` to every subscriber of `topic`.
    ///
    /// No-op when the topic has never been subscribed. Returns the number of
    /// receivers the message was handed to.
    pub async fn broadcast<T: Into<String>>(&self, topic: &str, msg: T) -> usize {
        let mut map = self.inner.write().await;
        let Some(sender) = map.get(topic) else {
            return 0;
        };
        let delivered = sender.send(msg.into()).unwrap_or(0);
        if sender.receiver_count() == 0 {
            tracing::debug!(topic, "dropping topic with no subscribers");
            map.remove(topic);
        }
        delivered
    }

    /// Number of live receivers on `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .read()
            .await
            .get(topic)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    pub async fn has_topic(&self, topic: &str) -> bool {
        self.inner.read().await.contains_key(topic)
    }

    // -------------------- Presence --------------------

    /// Increment presence refcount for `user_id` on `topic`.
    pub async fn register(&self, topic: &str, user_id: i64) {
        let mut p = self.presence.write().await;
        *p.entry(topic.to_string())
            .or_default()
            .entry(user_id)
            .or_insert(0) += 1;
    }

    /// Decrement presence refcount for `user_id` on `topic`.
    pub async fn unregister(&self, topic: &str, user_id: i64) {
        let mut p = self.presence.write().await;
        if let Some(users) = p.get_mut(topic) {
            if let Some(cnt) = users.get_mut(&user_id) {
                if *cnt > 1 {
                    *cnt -= 1;
                } else {
                    users.remove(&user_id);
                }
            }
            if users.is_empty() {
                p.remove(topic);
            }
        }
    }

    pub async fn is_user_present_on(&self, topic: &str, user_id: i64) -> bool {
        let p = self.presence.read().await;
        p.get(topic).is_some_and(|m| m.contains_key(&user_id))
    }

    /// Profile ids currently watching `topic`, sorted.
    pub async fn present_users(&self, topic: &str) -> Vec<i64> {
        let p = self.presence.read().await;
        let mut ids: Vec<i64> = p
            .get(topic)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }
}
