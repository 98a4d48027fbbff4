use crate::application::stream_merger::StreamMerger;
use crate::config::ChartConfig;
use crate::domain::{
    chart::{ChartSession, HoverResult, RangeChangeSource, SessionStats, ViewportState, VisibleRange},
    errors::{ChartError, ChartResult},
    events::{ChartEvent, EventDispatcher, InMemoryEventDispatcher, ListenerId},
    logging::LogComponent,
    market_data::{
        Bar, FeedEvent, FeedPayload, FeedSink, FrameDecoder, HistoricalBarSource, IndicatorSeries, LiveBarFeed,
        Price, SessionKey, SubscriptionHandle, Timestamp,
    },
};
use crate::{log_debug, log_info, log_warn};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use std::collections::BTreeMap;

/// Proof that a historical load was started for a given session generation.
///
/// Handing it back to [`ChartCoordinator::complete_switch`] after another
/// switch (or a teardown) yields [`ChartError::StaleSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchTicket {
    pub generation: u64,
    pub key: SessionKey,
    pub limit: usize,
}

/// Owns the single active `(symbol, interval)` session and its live feed.
///
/// Every subscription gets a fresh generation number and its own sink.
/// Switching keys or tearing down unsubscribes first and bumps the
/// generation, so frames still in flight from the old feed are dropped
/// before they reach the new buffer.
pub struct ChartCoordinator<H, F, D> {
    config: ChartConfig,
    source: H,
    feed: F,
    merger: StreamMerger<D>,
    session: Option<ChartSession>,
    generation: u64,
    subscription: Option<SubscriptionHandle>,
    tx: UnboundedSender<FeedEvent>,
    rx: Option<UnboundedReceiver<FeedEvent>>,
    dispatcher: InMemoryEventDispatcher,
    live: bool,
    torn_down: bool,
    closed: bool,
}

impl<H, F, D> ChartCoordinator<H, F, D>
where
    H: HistoricalBarSource,
    F: LiveBarFeed,
    D: FrameDecoder,
{
    pub fn new(config: ChartConfig, source: H, feed: F, decoder: D) -> Self {
        let (tx, rx) = mpsc::unbounded();
        Self {
            config,
            source,
            feed,
            merger: StreamMerger::new(decoder),
            session: None,
            generation: 0,
            subscription: None,
            tx,
            rx: Some(rx),
            dispatcher: InMemoryEventDispatcher::new(),
            live: false,
            torn_down: false,
            closed: false,
        }
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn source(&self) -> &H {
        &self.source
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn key(&self) -> Option<&SessionKey> {
        self.session.as_ref().map(|s| s.key())
    }

    pub fn session(&self) -> Option<&ChartSession> {
        self.session.as_ref()
    }

    /// Switch to `key`: drop the old feed, clear state, load history, subscribe.
    pub async fn switch_to(&mut self, key: SessionKey) -> ChartResult<()> {
        let ticket = self.begin_switch(key);
        let history = self.source.fetch_historical_bars(&ticket.key, ticket.limit).await;
        self.complete_switch(ticket, history)
    }

    /// First half of a switch. Runs synchronously so the old subscription is
    /// gone before any await point.
    pub fn begin_switch(&mut self, key: SessionKey) -> SwitchTicket {
        self.release_subscription();
        self.generation += 1;
        self.torn_down = self.closed;

        let key_changed = match self.session.as_mut() {
            Some(session) => session.reset(key.clone()),
            None => {
                self.session = Some(ChartSession::new(key.clone(), &self.config));
                true
            }
        };

        log_info!(
            LogComponent::Application("ChartCoordinator"),
            "switching to {} (generation {}, key changed: {})",
            key,
            self.generation,
            key_changed
        );
        self.publish(&ChartEvent::SessionReset { key: key.clone() });

        SwitchTicket { generation: self.generation, key, limit: self.config.history_limit() }
    }

    /// Second half of a switch: seed the buffer, then open the live feed.
    ///
    /// A fetch error is returned as-is and leaves the session empty. A failed
    /// subscription is not an error: history stays usable and a
    /// [`ChartEvent::SubscriptionFailed`] is published instead.
    pub fn complete_switch(&mut self, ticket: SwitchTicket, history: ChartResult<Vec<Bar>>) -> ChartResult<()> {
        if self.closed {
            return Err(ChartError::Disposed);
        }
        if self.torn_down || ticket.generation != self.generation {
            log_debug!(
                LogComponent::Application("ChartCoordinator"),
                "discarding history for {} (generation {} is no longer current)",
                ticket.key,
                ticket.generation
            );
            return Err(ChartError::StaleSession);
        }

        let bars = history.map_err(|err| {
            log_warn!(LogComponent::Application("ChartCoordinator"), "{}: history load failed: {}", ticket.key, err);
            err
        })?;

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ChartError::InvalidInput("no session to seed".into()))?;
        let loaded = session.load_history(bars)?;
        self.publish(&loaded);

        let sink = FeedSink::new(ticket.generation, self.tx.clone());
        match self.feed.subscribe(&ticket.key, sink) {
            Ok(handle) => {
                self.subscription = Some(handle);
                self.live = true;
            }
            Err(err) => self.mark_feed_failed(&ticket.key, err),
        }
        Ok(())
    }

    /// Apply one feed event. Events from an old generation are dropped.
    pub fn handle_feed_event(&mut self, event: FeedEvent) -> Option<ChartEvent> {
        let current = !self.torn_down && event.generation == self.generation;
        let session = self.session.as_mut()?;

        if !current {
            session.record_dropped_after_teardown();
            log_debug!(
                LogComponent::Application("ChartCoordinator"),
                "dropped event from generation {} (current {})",
                event.generation,
                self.generation
            );
            return None;
        }

        let outcome = match event.payload {
            FeedPayload::Frame(frame) => {
                self.live = true;
                self.merger.merge_frame(session, &frame)
            }
            FeedPayload::Bar(bar) => {
                self.live = true;
                self.merger.merge_bar(session, bar)
            }
            FeedPayload::Error(err) => {
                let key = session.key().clone();
                self.mark_feed_failed(&key, err);
                return None;
            }
        };

        if let Some(event) = &outcome {
            self.publish(event);
        }
        outcome
    }

    /// Drain whatever the feed has queued so far. Returns how many events were handled.
    pub fn pump(&mut self) -> usize {
        let mut pending = Vec::new();
        if let Some(rx) = self.rx.as_mut() {
            while let Ok(Some(event)) = rx.try_next() {
                pending.push(event);
            }
        }
        let count = pending.len();
        for event in pending {
            self.handle_feed_event(event);
        }
        count
    }

    /// Hand the feed receiver to an async driver; `pump` becomes a no-op.
    pub fn take_feed_events(&mut self) -> Option<UnboundedReceiver<FeedEvent>> {
        self.rx.take()
    }

    /// Release the live feed. Nothing delivered afterwards is applied.
    pub fn teardown(&mut self) {
        self.release_subscription();
        self.generation += 1;
        self.torn_down = true;
        log_info!(LogComponent::Application("ChartCoordinator"), "torn down at generation {}", self.generation);
    }

    /// Tear down for good: later switches fail with [`ChartError::Disposed`]
    /// and the feed receiver is dropped.
    pub fn close(&mut self) {
        self.teardown();
        self.closed = true;
        self.rx = None;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn snapshot(&self) -> Vec<Bar> {
        self.session.as_ref().map(|s| s.snapshot()).unwrap_or_default()
    }

    pub fn indicator_series(&self) -> BTreeMap<usize, IndicatorSeries> {
        self.session.as_ref().map(|s| s.indicator_series().clone()).unwrap_or_default()
    }

    pub fn viewport_state(&self) -> ViewportState {
        self.session.as_ref().map(|s| s.viewport_state()).unwrap_or_default()
    }

    pub fn visible_range(&self) -> Option<VisibleRange> {
        self.session.as_ref().and_then(|s| s.visible_range())
    }

    pub fn on_hover(&self, query: Option<Timestamp>) -> Option<HoverResult> {
        self.session.as_ref().and_then(|s| s.hover(query))
    }

    pub fn on_visible_range_changed(&mut self, range: VisibleRange, source: RangeChangeSource) {
        if let Some(session) = self.session.as_mut() {
            session.on_visible_range_changed(range, source);
        }
    }

    /// Pan the view as a user gesture. Returns the new range.
    pub fn pan_view(&mut self, delta_bars: f64) -> Option<VisibleRange> {
        self.session.as_mut().and_then(|s| s.pan_view(delta_bars))
    }

    /// Zoom the view as a user gesture. Returns the new range.
    pub fn zoom_view(&mut self, factor: f64, anchor_ratio: f64) -> Option<VisibleRange> {
        self.session.as_mut().and_then(|s| s.zoom_view(factor, anchor_ratio))
    }

    pub fn subscribe_changes<L>(&mut self, listener: L) -> ListenerId
    where
        L: Fn(&ChartEvent) + 'static,
    {
        self.dispatcher.subscribe(listener)
    }

    pub fn unsubscribe_changes(&mut self, id: ListenerId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    pub fn stats(&self) -> SessionStats {
        self.session.as_ref().map(|s| s.stats()).unwrap_or_default()
    }

    pub fn last_price(&self) -> Option<Price> {
        self.session.as_ref().and_then(|s| s.last_price())
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    fn release_subscription(&mut self) {
        if let Some(mut handle) = self.subscription.take() {
            handle.unsubscribe();
        }
        self.live = false;
    }

    fn mark_feed_failed(&mut self, key: &SessionKey, err: ChartError) {
        self.live = false;
        log_warn!(LogComponent::Application("ChartCoordinator"), "{}: live feed unavailable: {}", key, err);
        self.publish(&ChartEvent::SubscriptionFailed { key: key.clone(), reason: err.to_string() });
    }

    fn publish(&self, event: &ChartEvent) {
        self.dispatcher.publish(event);
    }
}
