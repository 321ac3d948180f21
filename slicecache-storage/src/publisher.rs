//! Update publisher
//!
//! Fan-out of cache events to any number of subscribers.
//!
//! - Uses a tokio broadcast channel per event kind
//! - Publishing never blocks; with no subscribers the event is dropped
//! - A subscriber that falls more than `capacity` events behind observes
//!   [`SubscriptionError::Lagged`] and resumes with the oldest retained event
//! - Dropping a [`Subscription`] unsubscribes it

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::events::KeyedEvent;

/// Errors observed by a subscriber.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Subscriber lagged: {0} events dropped")]
    Lagged(u64),
}

type EventFilter<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// One event channel.
pub struct Publisher<E> {
    name: &'static str,
    tx: broadcast::Sender<E>,
}

impl<E: Clone + Send + 'static> Publisher<E> {
    /// Create a channel buffering up to `capacity` events per subscriber.
    ///
    /// A zero capacity is raised to one.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { name, tx }
    }

    /// Deliver an event to every current subscriber.
    ///
    /// Returns the number of subscribers the event was queued for.
    pub fn publish(&self, event: E) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!(channel = self.name, receivers, "Published event");
                receivers
            }
            Err(_) => {
                debug!(channel = self.name, "No subscribers for event");
                0
            }
        }
    }

    /// Subscribe to every future event on this channel.
    pub fn subscribe(&self) -> Subscription<E> {
        Subscription {
            name: self.name,
            rx: self.tx.subscribe(),
            filter: None,
        }
    }

    /// Subscribe to future events concerning one key.
    pub fn subscribe_to(&self, key: E::Key) -> Subscription<E>
    where
        E: KeyedEvent,
        E::Key: Send + Sync + 'static,
    {
        Subscription {
            name: self.name,
            rx: self.tx.subscribe(),
            filter: Some(Arc::new(move |event: &E| event.concerns(&key))),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<E> fmt::Debug for Publisher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("name", &self.name)
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}

/// A live subscription to one channel, optionally filtered by key.
pub struct Subscription<E> {
    name: &'static str,
    rx: broadcast::Receiver<E>,
    filter: Option<EventFilter<E>>,
}

impl<E: Clone + Send + 'static> Subscription<E> {
    fn accepts(&self, event: &E) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    fn lagged(&self, skipped: u64) -> SubscriptionError {
        warn!(channel = self.name, skipped, "Subscriber lagged behind");
        SubscriptionError::Lagged(skipped)
    }

    /// Next already-published event, without waiting.
    ///
    /// `Ok(None)` means nothing is pending.
    pub fn try_next(&mut self) -> Result<Option<E>, SubscriptionError> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.accepts(&event) => return Ok(Some(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    return Err(self.lagged(skipped))
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return Ok(None),
            }
        }
    }

    /// Wait for the next event. `Ok(None)` once the publisher is gone.
    pub async fn recv(&mut self) -> Result<Option<E>, SubscriptionError> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.accepts(&event) => return Ok(Some(event)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    return Err(self.lagged(skipped))
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }

    /// All pending events, stopping early on lag.
    pub fn drain(&mut self) -> Result<Vec<E>, SubscriptionError> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next()? {
            events.push(event);
        }
        Ok(events)
    }

    /// Convert into a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = Result<E, SubscriptionError>> + Send
    where
        E: Sync,
    {
        let Subscription { name, rx, filter } = self;
        BroadcastStream::new(rx).filter_map(move |result| match result {
            Ok(event) => filter
                .as_ref()
                .map_or(true, |filter| filter(&event))
                .then_some(Ok(event)),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(channel = name, skipped, "Subscriber lagged behind");
                Some(Err(SubscriptionError::Lagged(skipped)))
            }
        })
    }
}

impl<E> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}
