use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde_json::Value;

/// What a source reports for one subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Full contents of the collection. `None` means the collection is empty.
    Snapshot(Option<Value>),
    /// Terminal failure reported by the transport.
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedMessage {
    pub subscription: u64,
    pub event: FeedEvent,
}

/// Producer half handed to a source on subscribe.
///
/// Once the matching [`Subscription`] is released every send is refused, so
/// a source loop can use the return value (or [`FeedSink::is_cancelled`]) as
/// its stop signal.
#[derive(Debug, Clone)]
pub struct FeedSink {
    subscription: u64,
    tx: Sender<FeedMessage>,
    cancelled: Arc<AtomicBool>,
}

impl FeedSink {
    pub fn new(subscription: u64, tx: Sender<FeedMessage>) -> Self {
        Self {
            subscription,
            tx,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscription_id(&self) -> u64 {
        self.subscription
    }

    pub fn snapshot(&self, data: Option<Value>) -> bool {
        self.send(FeedEvent::Snapshot(data))
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.send(FeedEvent::Error(message.into()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Handle that releases this sink.
    pub fn handle(&self) -> Subscription {
        Subscription {
            cancelled: self.cancelled.clone(),
        }
    }

    fn send(&self, event: FeedEvent) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.tx
            .send(FeedMessage {
                subscription: self.subscription,
                event,
            })
            .is_ok()
    }
}

/// Unsubscribe handle. Dropping it unsubscribes as well.
#[derive(Debug)]
pub struct Subscription {
    cancelled: Arc<AtomicBool>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

pub trait SubscriptionSource {
    /// Start delivering snapshots of `collection` into `sink`.
    ///
    /// Implementations deliver callbacks one at a time, in order. An `Err`
    /// here means the subscription never opened.
    fn subscribe(&self, collection: &str, sink: FeedSink) -> Result<Subscription>;
}

impl<S: SubscriptionSource + ?Sized> SubscriptionSource for Box<S> {
    fn subscribe(&self, collection: &str, sink: FeedSink) -> Result<Subscription> {
        (**self).subscribe(collection, sink)
    }
}

impl<S: SubscriptionSource + ?Sized> SubscriptionSource for Arc<S> {
    fn subscribe(&self, collection: &str, sink: FeedSink) -> Result<Subscription> {
        (**self).subscribe(collection, sink)
    }
}

/// Source driven by hand: every subscribe is recorded and the caller pushes
/// events through [`ManualSource::push_snapshot`] / [`ManualSource::push_error`].
#[derive(Debug, Default)]
pub struct ManualSource {
    sinks: Mutex<Vec<(String, FeedSink)>>,
    refuse: Mutex<Option<String>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next subscribe calls fail with `message`.
    pub fn refuse_with(&self, message: impl Into<String>) {
        *self.refuse.lock().expect("manual source lock poisoned") = Some(message.into());
    }

    pub fn subscribe_count(&self) -> usize {
        self.sinks.lock().expect("manual source lock poisoned").len()
    }

    pub fn active_count(&self) -> usize {
        self.sinks
            .lock()
            .expect("manual source lock poisoned")
            .iter()
            .filter(|(_, sink)| !sink.is_cancelled())
            .count()
    }

    pub fn last_collection(&self) -> Option<String> {
        self.sinks
            .lock()
            .expect("manual source lock poisoned")
            .last()
            .map(|(name, _)| name.clone())
    }

    /// Deliver to the most recent subscription. Returns false if it was released.
    pub fn push_snapshot(&self, data: Option<Value>) -> bool {
        self.with_latest(|sink| sink.snapshot(data))
    }

    pub fn push_error(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        self.with_latest(|sink| sink.error(message))
    }

    fn with_latest(&self, f: impl FnOnce(&FeedSink) -> bool) -> bool {
        let sinks = self.sinks.lock().expect("manual source lock poisoned");
        match sinks.last() {
            Some((_, sink)) => f(sink),
            None => false,
        }
    }
}

impl SubscriptionSource for ManualSource {
    fn subscribe(&self, collection: &str, sink: FeedSink) -> Result<Subscription> {
        if let Some(message) = self
            .refuse
            .lock()
            .expect("manual source lock poisoned")
            .clone()
        {
            return Err(anyhow::anyhow!(message));
        }
        let handle = sink.handle();
        self.sinks
            .lock()
            .expect("manual source lock poisoned")
            .push((collection.to_string(), sink));
        Ok(handle)
    }
}
