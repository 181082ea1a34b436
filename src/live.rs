//! Realtime change feed connecting the store to WebSocket subscribers.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Mutation kind carried on the feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Put,
    Delete,
}

/// One document mutation, published after the write is durable.
#[derive(Debug, Clone, Serialize)]
pub struct Change {
    pub collection: String,
    /// Parent article id when the change concerns a comment.
    pub parent: Option<String>,
    pub id: String,
    pub op: Op,
    /// New document body; `None` for deletes.
    pub doc: Option<Value>,
}

/// Broadcast hub. Cloning shares the underlying channel, so every clone of a
/// [`crate::store::Store`] publishes to the same subscribers.
#[derive(Clone)]
pub struct Hub {
    tx: broadcast::Sender<Change>,
}

impl Hub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Publish a change. Dropped silently when nobody is subscribed.
    pub fn publish(&self, change: Change) {
        let _ = self.tx.send(change);
    }

    /// Subscribe to all changes from this point on. Snapshots of existing
    /// documents come from the store, not from the feed.
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_changes() {
        let hub = Hub::new();
        let mut rx = hub.subscribe();
        hub.publish(Change {
            collection: "articles".into(),
            parent: None,
            id: "a1".into(),
            op: Op::Put,
            doc: Some(serde_json::json!({"id": "a1"})),
        });
        let change = rx.recv().await.unwrap();
        assert_eq!(change.collection, "articles");
        assert_eq!(change.op, Op::Put);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let hub = Hub::new();
        hub.publish(Change {
            collection: "rituals".into(),
            parent: None,
            id: "r1".into(),
            op: Op::Delete,
            doc: None,
        });
    }

    #[tokio::test]
    async fn clones_share_the_channel() {
        let hub = Hub::new();
        let clone = hub.clone();
        let mut rx = hub.subscribe();
        clone.publish(Change {
            collection: "messages".into(),
            parent: None,
            id: "m1".into(),
            op: Op::Put,
            doc: None,
        });
        assert_eq!(rx.recv().await.unwrap().id, "m1");
    }
}
