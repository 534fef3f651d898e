use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::feed::{FeedEvent, FeedMessage, FeedSink, Subscription, SubscriptionSource};
use crate::standings::{RankedEntry, build_standings};

pub const DEFAULT_COLLECTION: &str = "teams";

/// Bookkeeping for the last snapshot that was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncInfo {
    /// Number of snapshots applied by this store, this one included.
    pub sequence: u64,
    pub at: DateTime<Utc>,
    pub records: usize,
    pub skipped: usize,
}

/// Owns one live subscription and the ranked sequence built from it.
///
/// Sources deliver on their own threads into a channel; nothing is applied
/// until the owner calls [`SyncStore::pump`] (or [`SyncStore::apply`]), so all
/// mutation stays on the owner's timeline.
pub struct SyncStore<S> {
    source: S,
    collection: String,
    tx: Sender<FeedMessage>,
    rx: Receiver<FeedMessage>,
    next_subscription: u64,
    active: Option<(u64, Subscription)>,
    received: bool,
    entries: Arc<[RankedEntry]>,
    error: Option<String>,
    stale: bool,
    last_sync: Option<SyncInfo>,
}

impl<S: SubscriptionSource> SyncStore<S> {
    pub fn new(source: S) -> Self {
        Self::with_collection(source, DEFAULT_COLLECTION)
    }

    pub fn with_collection(source: S, collection: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            source,
            collection: collection.into(),
            tx,
            rx,
            next_subscription: 1,
            active: None,
            received: false,
            entries: Arc::from(Vec::<RankedEntry>::new()),
            error: None,
            stale: false,
            last_sync: None,
        }
    }

    /// Open the subscription. Does nothing while one is already open.
    pub fn start(&mut self) {
        if self.active.is_some() {
            return;
        }
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.received = false;

        let sink = FeedSink::new(id, self.tx.clone());
        match self.source.subscribe(&self.collection, sink) {
            Ok(handle) => {
                info!(collection = %self.collection, subscription = id, "subscribed");
                self.active = Some((id, handle));
            }
            Err(err) => self.fail(format!("{err:#}")),
        }
    }

    /// Release the subscription. Anything it already queued is discarded.
    pub fn stop(&mut self) {
        if let Some((id, handle)) = self.active.take() {
            handle.unsubscribe();
            info!(collection = %self.collection, subscription = id, "unsubscribed");
        }
        let dropped = self.rx.try_iter().count();
        if dropped > 0 {
            debug!(dropped, "discarded queued feed messages");
        }
    }

    /// Apply every queued message in delivery order. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(msg) = self.rx.try_recv() {
            if self.apply(msg) {
                applied += 1;
            }
        }
        applied
    }

    /// Apply one message. Messages from a released subscription are ignored.
    pub fn apply(&mut self, msg: FeedMessage) -> bool {
        let current = self.active.as_ref().map(|(id, _)| *id);
        if current != Some(msg.subscription) {
            debug!(subscription = msg.subscription, "ignoring message from released subscription");
            return false;
        }
        match msg.event {
            FeedEvent::Snapshot(data) => self.apply_snapshot(data),
            FeedEvent::Error(message) => self.fail(message),
        }
        true
    }

    fn apply_snapshot(&mut self, data: Option<Value>) {
        let standings = build_standings(data.as_ref());
        for err in &standings.rejected {
            warn!(collection = %self.collection, "skipping record: {err}");
        }
        let info = SyncInfo {
            sequence: self.last_sync.as_ref().map_or(1, |prev| prev.sequence + 1),
            at: Utc::now(),
            records: standings.entries.len(),
            skipped: standings.rejected.len(),
        };
        debug!(records = info.records, skipped = info.skipped, "snapshot applied");

        self.entries = Arc::from(standings.entries);
        self.last_sync = Some(info);
        self.received = true;
        self.error = None;
        self.stale = false;
    }

    fn fail(&mut self, message: String) {
        warn!(collection = %self.collection, "subscription failed: {message}");
        if let Some((_, handle)) = self.active.take() {
            handle.unsubscribe();
        }
        self.received = true;
        self.error = Some(message);
        self.stale = true;
    }

    /// Current ranked sequence. The returned `Arc` never changes under the caller.
    pub fn snapshot(&self) -> Arc<[RankedEntry]> {
        self.entries.clone()
    }

    pub fn entries(&self) -> &[RankedEntry] {
        &self.entries
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True until the first callback (snapshot or error) since the last start.
    pub fn is_loading(&self) -> bool {
        !self.received
    }

    /// True when the data on hand was not confirmed by the latest subscription.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn is_subscribed(&self) -> bool {
        self.active.is_some()
    }

    pub fn last_sync(&self) -> Option<&SyncInfo> {
        self.last_sync.as_ref()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
