//! Broadcast bus a runner publishes its lifecycle events on.
//!
//! Hosts hand a clone of the bus to each `ProcessRunner` and watch one run
//! through [`EventBus::subscribe_run`]. Delivery is best effort: a run never
//! waits on its observers, and a subscriber that falls behind skips events.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::types::{EventEnvelope, RunEvent};

/// Events buffered per subscriber before it starts lagging
const DEFAULT_CAPACITY: usize = 1000;

/// Shared by every run of a host; clones publish to the same subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    published: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            published: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Send an envelope to every subscriber of every run.
    ///
    /// Returns how many subscribers it reached. With nobody listening the
    /// envelope is dropped, which is not an error for a run.
    pub fn publish(&self, envelope: EventEnvelope) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Unfiltered stream of all runs' envelopes, starting from now.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Envelopes published since the bus was created, across all runs
    pub fn event_count(&self) -> usize {
        self.published.load(Ordering::Relaxed)
    }

    /// Wrap and publish a run event
    pub fn emit(&self, event: RunEvent) -> usize {
        self.publish(EventEnvelope::new(event))
    }

    /// Subscribe to the events of a single run
    pub fn subscribe_run(&self, run_id: Uuid) -> RunSubscription {
        RunSubscription {
            run_id,
            receiver: self.sender.subscribe(),
            finished: false,
        }
    }
}

/// Receiver filtered to one run that ends after the run's terminal event
pub struct RunSubscription {
    run_id: Uuid,
    receiver: broadcast::Receiver<EventEnvelope>,
    finished: bool,
}

impl RunSubscription {
    /// Wait for the next event of this run.
    ///
    /// Returns `None` once the terminal event has been delivered or the bus
    /// is gone. Lagged receivers skip the missed events and keep going.
    pub async fn next(&mut self) -> Option<RunEvent> {
        if self.finished {
            return None;
        }
        loop {
            match self.receiver.recv().await {
                Ok(envelope) if envelope.event.run_id() == self.run_id => {
                    self.finished = envelope.event.is_terminal();
                    return Some(envelope.event);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    self.finished = true;
                    return None;
                }
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("event_count", &self.event_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(run_id: Uuid) -> RunEvent {
        RunEvent::RunStarted {
            run_id,
            process: "DocumentationCycle".to_string(),
            entry_event: "Start".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let envelope = EventEnvelope::new(started(Uuid::new_v4()));

        let sent = bus.publish(envelope.clone());
        assert_eq!(sent, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, envelope.id);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let run_id = Uuid::new_v4();
        let sent = bus.emit(started(run_id));
        assert_eq!(sent, 2);

        let received1 = rx1.recv().await.unwrap();
        let received2 = rx2.recv().await.unwrap();

        assert_eq!(received1.event.run_id(), run_id);
        assert_eq!(received2.event.run_id(), run_id);
    }

    #[tokio::test]
    async fn test_no_subscribers() {
        let bus = EventBus::new();

        // No subscribers, event is dropped
        let sent = bus.emit(started(Uuid::new_v4()));
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn test_run_subscription_counts_as_subscriber() {
        let bus = EventBus::new();
        let first = bus.subscribe_run(Uuid::new_v4());
        let _second = bus.subscribe_run(Uuid::new_v4());
        assert_eq!(bus.subscriber_count(), 2);

        drop(first);
        assert_eq!(bus.emit(started(Uuid::new_v4())), 1);
    }

    #[tokio::test]
    async fn test_event_count() {
        let bus = EventBus::new();
        assert_eq!(bus.event_count(), 0);

        let run_id = Uuid::new_v4();
        bus.emit(RunEvent::RunCancelled { run_id });
        assert_eq!(bus.event_count(), 1);

        bus.emit(RunEvent::RunCancelled { run_id });
        assert_eq!(bus.event_count(), 2);
    }

    #[tokio::test]
    async fn test_run_subscription_filters_and_ends() {
        let bus = EventBus::new();
        let run_id = Uuid::new_v4();
        let mut sub = bus.subscribe_run(run_id);

        bus.emit(started(Uuid::new_v4()));
        bus.emit(started(run_id));
        bus.emit(RunEvent::RunCompleted {
            run_id,
            dispatched: 1,
            published: false,
        });
        bus.emit(started(run_id));

        assert!(matches!(sub.next().await, Some(RunEvent::RunStarted { .. })));
        assert!(matches!(sub.next().await, Some(RunEvent::RunCompleted { .. })));
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_runner_clone_reaches_host_subscription() {
        let host = EventBus::new();
        let runner_side = host.clone();
        let run_id = Uuid::new_v4();
        let mut sub = host.subscribe_run(run_id);

        runner_side.emit(started(run_id));
        assert!(matches!(sub.next().await, Some(RunEvent::RunStarted { .. })));
        assert_eq!(host.event_count(), 1);
    }

    #[tokio::test]
    async fn test_run_subscription_ends_when_bus_dropped() {
        let bus = EventBus::new();
        let run_id = Uuid::new_v4();
        let mut sub = bus.subscribe_run(run_id);

        bus.emit(started(run_id));
        drop(bus);

        assert!(sub.next().await.is_some());
        assert!(sub.next().await.is_none());
    }
}
