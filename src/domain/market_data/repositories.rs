use super::entities::{Bar, LiveBar};
use super::value_objects::SessionKey;
use crate::domain::errors::{ChartError, ChartResult};
use futures::channel::mpsc::UnboundedSender;
use futures::future::AbortHandle;
use std::cell::Cell;
use std::rc::Rc;

/// Source of finalized historical bars used to seed a session
#[allow(async_fn_in_trait)]
pub trait HistoricalBarSource {
    async fn fetch_historical_bars(&self, key: &SessionKey, limit: usize) -> ChartResult<Vec<Bar>>;
}

/// Turns one raw live frame into a bar plus its finality flag
pub trait FrameDecoder {
    fn decode(&self, frame: &str) -> ChartResult<LiveBar>;
}

/// Live kline feed keyed by symbol and interval.
///
/// Implementations push into the given sink until the returned handle is
/// unsubscribed; anything pushed afterwards is dropped by the sink itself.
pub trait LiveBarFeed {
    fn subscribe(&self, key: &SessionKey, sink: FeedSink) -> ChartResult<SubscriptionHandle>;
}

/// What a feed delivers
#[derive(Debug, Clone, PartialEq)]
pub enum FeedPayload {
    /// Raw text frame still to be decoded.
    Frame(String),
    /// Already decoded bar.
    Bar(LiveBar),
    /// The feed failed or dropped.
    Error(ChartError),
}

/// Feed payload tagged with the session generation that subscribed it
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub generation: u64,
    pub payload: FeedPayload,
}

/// Write end handed to a [`LiveBarFeed`]
#[derive(Debug, Clone)]
pub struct FeedSink {
    generation: u64,
    tx: UnboundedSender<FeedEvent>,
    closed: Rc<Cell<bool>>,
}

impl FeedSink {
    pub fn new(generation: u64, tx: UnboundedSender<FeedEvent>) -> Self {
        Self { generation, tx, closed: Rc::new(Cell::new(false)) }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Handle controlling this sink's lifetime.
    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle { closed: Rc::clone(&self.closed), abort: None }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get() || self.tx.is_closed()
    }

    /// Returns `false` once the subscription is torn down.
    pub fn send(&self, payload: FeedPayload) -> bool {
        if self.is_closed() {
            return false;
        }
        self.tx.unbounded_send(FeedEvent { generation: self.generation, payload }).is_ok()
    }

    pub fn send_frame(&self, frame: impl Into<String>) -> bool {
        self.send(FeedPayload::Frame(frame.into()))
    }

    pub fn send_bar(&self, bar: LiveBar) -> bool {
        self.send(FeedPayload::Bar(bar))
    }

    pub fn send_error(&self, error: ChartError) -> bool {
        self.send(FeedPayload::Error(error))
    }
}

/// Live subscription; unsubscribing is idempotent and also happens on drop
#[derive(Debug)]
pub struct SubscriptionHandle {
    closed: Rc<Cell<bool>>,
    abort: Option<AbortHandle>,
}

impl SubscriptionHandle {
    /// Also abort the feed's background task on unsubscribe.
    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = Some(abort);
        self
    }

    pub fn is_active(&self) -> bool {
        !self.closed.get()
    }

    pub fn unsubscribe(&mut self) {
        self.closed.set(true);
        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
