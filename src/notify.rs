//! Best-effort broadcast of task events

use crate::types::{Event, TaskId, TaskKind, TaskStatus};
use tokio::sync::broadcast;

/// Fan-out channel for [`Event`]s
///
/// Sending never blocks and never fails from the caller's point of view. Slow
/// subscribers lag (and see `RecvError::Lagged`) instead of holding up a task.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: broadcast::Sender<Event>,
}

impl Notifier {
    /// Create a notifier that buffers up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Send an event to every current subscriber
    pub fn broadcast(&self, event: Event) {
        // send() only fails when nobody is listening
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            tracing::debug!(?event, "no subscribers, event dropped");
        }
    }

    /// Convenience wrapper for [`Event::TaskUpdate`]
    pub fn task_update(
        &self,
        task_id: &TaskId,
        kind: TaskKind,
        status: TaskStatus,
        message: Option<String>,
        progress: Option<u64>,
        total: Option<u64>,
    ) {
        self.broadcast(Event::TaskUpdate {
            task_id: task_id.clone(),
            kind,
            status,
            message,
            progress,
            total,
        });
    }

    /// Subscribe to all events sent from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_without_subscribers_is_silently_dropped() {
        let notifier = Notifier::new(8);
        assert_eq!(notifier.subscriber_count(), 0);

        notifier.broadcast(Event::Shutdown);
    }

    #[tokio::test]
    async fn every_subscriber_receives_the_event() {
        let notifier = Notifier::new(8);
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();

        notifier.task_update(
            &TaskId::new("t-1"),
            TaskKind::Download,
            TaskStatus::InProgress,
            Some("Downloading".into()),
            Some(1),
            Some(10),
        );

        for rx in [&mut first, &mut second] {
            match rx.recv().await.unwrap() {
                Event::TaskUpdate {
                    task_id, progress, ..
                } => {
                    assert_eq!(task_id.as_str(), "t-1");
                    assert_eq!(progress, Some(1));
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let notifier = Notifier::new(2);
        let mut rx = notifier.subscribe();

        for _ in 0..5 {
            notifier.broadcast(Event::Shutdown);
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }
}
