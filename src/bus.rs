use std::sync::Arc;
use tokio::sync::broadcast;

/// Broadcast topic with bounded capacity.
/// `T` must be `Send + Sync` because we hop across threads.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes `msg`, returning how many subscribers it reached.
    pub fn publish(&self, msg: T) -> usize {
        self.tx.send(Arc::new(msg)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let topic: Topic<u32> = Topic::new(4);
        let mut a = topic.subscribe();
        let mut b = topic.subscribe();

        assert_eq!(topic.publish(7), 2);
        assert_eq!(*a.recv().await.unwrap(), 7);
        assert_eq!(*b.recv().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let topic: Topic<u32> = Topic::new(4);
        assert_eq!(topic.publish(1), 0);
    }

    #[tokio::test]
    async fn test_receiver_sees_close_after_sender_drops() {
        let topic: Topic<&'static str> = Topic::new(4);
        let mut rx = topic.subscribe();
        topic.publish("last");
        drop(topic);

        assert_eq!(*rx.recv().await.unwrap(), "last");
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));
    }
}
