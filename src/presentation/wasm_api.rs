use crate::application::ChartCoordinator;
use crate::config::ChartConfig;
use crate::domain::{
    chart::{RangeChangeSource, VisibleRange},
    errors::ChartError,
    events::ChartEvent,
    logging::LogComponent,
    market_data::{FeedEvent, HistoricalBarSource, SessionKey, Symbol, TimeInterval, Timestamp},
};
use crate::infrastructure::{
    http::AnalyticsApiClient,
    websocket::{BinanceKlineDecoder, BinanceLiveFeed},
};
use crate::{log_debug, log_warn};
use futures::StreamExt;
use futures::channel::mpsc::UnboundedReceiver;
use futures::future::{AbortHandle, Abortable};
use gloo::utils::format::JsValueSerdeExt;
use js_sys::{Function, Promise};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

type BrowserCoordinator = ChartCoordinator<AnalyticsApiClient, BinanceLiveFeed, BinanceKlineDecoder>;

/// JS handle to one live chart: history from the analytics API, live bars
/// from Binance, change callbacks after every mutation.
#[wasm_bindgen]
pub struct LiveChart {
    coordinator: Rc<RefCell<BrowserCoordinator>>,
    pending: Rc<RefCell<VecDeque<ChartEvent>>>,
    listeners: Rc<RefCell<Listeners<Function>>>,
    pump: Option<AbortHandle>,
}

#[wasm_bindgen]
impl LiveChart {
    /// `config_json` is an optional JSON object of [`ChartConfig`] fields.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<LiveChart, JsValue> {
        let config = ChartConfig::from_json(config_json.as_deref().unwrap_or("")).map_err(to_js_error)?;
        let source = AnalyticsApiClient::new(config.api_base.clone());
        let feed = BinanceLiveFeed::new(config.stream_base.clone());
        let mut coordinator = ChartCoordinator::new(config, source, feed, BinanceKlineDecoder::new());

        let pending = Rc::new(RefCell::new(VecDeque::new()));
        let queue = Rc::clone(&pending);
        coordinator.subscribe_changes(move |event: &ChartEvent| queue.borrow_mut().push_back(event.clone()));
        let feed_events = coordinator.take_feed_events();

        let mut chart = LiveChart {
            coordinator: Rc::new(RefCell::new(coordinator)),
            pending,
            listeners: Rc::new(RefCell::new(Listeners::default())),
            pump: None,
        };
        if let Some(rx) = feed_events {
            chart.spawn_pump(rx);
        }
        Ok(chart)
    }

    /// Switch to `symbol`/`interval`. Resolves `true` once history is loaded,
    /// `false` if a later switch superseded this one. Throws after `dispose`.
    #[wasm_bindgen(js_name = switchTo)]
    pub fn switch_to(&self, symbol: String, interval: String) -> Result<Promise, JsValue> {
        let key = parse_key(&symbol, &interval).map_err(to_js_error)?;
        let (ticket, source) = {
            let mut coordinator = self.coordinator.borrow_mut();
            if coordinator.is_closed() {
                return Err(to_js_error(ChartError::Disposed));
            }
            (coordinator.begin_switch(key), coordinator.source().clone())
        };
        self.flush();

        let coordinator = Rc::clone(&self.coordinator);
        let pending = Rc::clone(&self.pending);
        let listeners = Rc::clone(&self.listeners);
        Ok(future_to_promise(async move {
            let history = source.fetch_historical_bars(&ticket.key, ticket.limit).await;
            let result = coordinator.borrow_mut().complete_switch(ticket, history);
            notify(&pending, &listeners);
            match result {
                Ok(()) => Ok(JsValue::TRUE),
                Err(ChartError::StaleSession) => Ok(JsValue::FALSE),
                Err(err) => Err(to_js_error(err)),
            }
        }))
    }

    #[wasm_bindgen(js_name = getSnapshot)]
    pub fn get_snapshot(&self) -> Result<JsValue, JsValue> {
        to_js(&self.coordinator.borrow().snapshot())
    }

    /// `{ "<window>": [value | null, ...] }`, aligned with the snapshot.
    #[wasm_bindgen(js_name = getIndicatorSeries)]
    pub fn get_indicator_series(&self) -> Result<JsValue, JsValue> {
        let series: BTreeMap<usize, Vec<Option<f64>>> = self
            .coordinator
            .borrow()
            .indicator_series()
            .into_iter()
            .map(|(window, s)| (window, s.values().to_vec()))
            .collect();
        to_js(&series)
    }

    #[wasm_bindgen(js_name = getViewportState)]
    pub fn get_viewport_state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.coordinator.borrow().viewport_state())
    }

    #[wasm_bindgen(js_name = getVisibleRange)]
    pub fn get_visible_range(&self) -> Result<JsValue, JsValue> {
        to_js(&self.coordinator.borrow().visible_range())
    }

    /// Bar and indicator values at `time` (ms), or the latest bar when omitted.
    /// `null` when no bar opens exactly at `time`.
    #[wasm_bindgen(js_name = onHover)]
    pub fn on_hover(&self, time: Option<f64>) -> Result<JsValue, JsValue> {
        match hover_query(time) {
            Some(query) => to_js(&self.coordinator.borrow().on_hover(query)),
            None => Ok(JsValue::NULL),
        }
    }

    /// Report the range the chart now shows. `programmatic` marks echoes of
    /// fit / scroll commands so they do not count as user interaction.
    #[wasm_bindgen(js_name = onVisibleRangeChange)]
    pub fn on_visible_range_change(&self, from: f64, to: f64, programmatic: bool) {
        if !from.is_finite() || !to.is_finite() {
            return;
        }
        let source = if programmatic { RangeChangeSource::Programmatic } else { RangeChangeSource::User };
        self.coordinator.borrow_mut().on_visible_range_changed(VisibleRange::new(from, to), source);
    }

    /// Pan by `delta_bars` as a user gesture; returns the new range or `null`.
    #[wasm_bindgen(js_name = panBy)]
    pub fn pan_by(&self, delta_bars: f64) -> Result<JsValue, JsValue> {
        to_js(&self.coordinator.borrow_mut().pan_view(delta_bars))
    }

    /// Zoom by `factor` (> 1 zooms in) around `anchor_ratio` of the width.
    #[wasm_bindgen(js_name = zoomBy)]
    pub fn zoom_by(&self, factor: f64, anchor_ratio: f64) -> Result<JsValue, JsValue> {
        to_js(&self.coordinator.borrow_mut().zoom_view(factor, anchor_ratio))
    }

    /// Register a callback receiving each change event as a plain object.
    /// Returns an id for `offChange`.
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, callback: Function) -> u32 {
        self.listeners.borrow_mut().add(callback)
    }

    #[wasm_bindgen(js_name = offChange)]
    pub fn off_change(&self, id: u32) -> bool {
        self.listeners.borrow_mut().remove(id)
    }

    #[wasm_bindgen(js_name = clearListeners)]
    pub fn clear_listeners(&self) {
        self.listeners.borrow_mut().clear();
    }

    #[wasm_bindgen(js_name = getStats)]
    pub fn get_stats(&self) -> Result<JsValue, JsValue> {
        to_js(&self.coordinator.borrow().stats())
    }

    #[wasm_bindgen(js_name = lastPrice)]
    pub fn last_price(&self) -> Option<f64> {
        self.coordinator.borrow().last_price().map(|p| p.value())
    }

    #[wasm_bindgen(js_name = isLive)]
    pub fn is_live(&self) -> bool {
        self.coordinator.borrow().is_live()
    }

    /// Release the live feed and listeners. The chart keeps its last data.
    pub fn dispose(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Ok(mut coordinator) = self.coordinator.try_borrow_mut() {
            coordinator.close();
        }
        self.listeners.borrow_mut().clear();
        self.pending.borrow_mut().clear();
    }
}

impl LiveChart {
    fn spawn_pump(&mut self, mut rx: UnboundedReceiver<FeedEvent>) {
        let coordinator = Rc::clone(&self.coordinator);
        let pending = Rc::clone(&self.pending);
        let listeners = Rc::clone(&self.listeners);
        let (abort, registration) = AbortHandle::new_pair();

        let task = Abortable::new(
            async move {
                while let Some(event) = rx.next().await {
                    coordinator.borrow_mut().handle_feed_event(event);
                    notify(&pending, &listeners);
                }
            },
            registration,
        );
        spawn_local(async move {
            if task.await.is_err() {
                log_debug!(LogComponent::Presentation("LiveChart"), "feed pump stopped");
            }
        });
        self.pump = Some(abort);
    }

    fn flush(&self) {
        notify(&self.pending, &self.listeners);
    }
}

impl Drop for LiveChart {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Deliver queued events outside any coordinator borrow so callbacks may
/// read the chart back.
fn notify(pending: &RefCell<VecDeque<ChartEvent>>, listeners: &RefCell<Listeners<Function>>) {
    let events: Vec<ChartEvent> = pending.borrow_mut().drain(..).collect();
    if events.is_empty() {
        return;
    }
    let callbacks = listeners.borrow().snapshot();
    for event in events {
        let value = match JsValue::from_serde(&event) {
            Ok(value) => value,
            Err(err) => {
                log_warn!(LogComponent::Presentation("LiveChart"), "cannot serialize {}: {}", event.event_type(), err);
                continue;
            }
        };
        for callback in &callbacks {
            if let Err(err) = callback.call1(&JsValue::NULL, &value) {
                log_warn!(LogComponent::Presentation("LiveChart"), "change listener threw: {:?}", err);
            }
        }
    }
}

/// Change callbacks keyed by the id handed back to JS. Ids start at 1.
#[derive(Debug)]
struct Listeners<T> {
    next_id: u32,
    entries: Vec<(u32, T)>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self { next_id: 1, entries: Vec::new() }
    }
}

impl<T: Clone> Listeners<T> {
    fn add(&mut self, listener: T) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.entries.push((id, listener));
        id
    }

    fn remove(&mut self, id: u32) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    /// Copy out so callbacks may register or remove listeners while running.
    fn snapshot(&self) -> Vec<T> {
        self.entries.iter().map(|(_, listener)| listener.clone()).collect()
    }
}

/// `Some(query)` for the coordinator, `None` when `time` cannot be an open
/// time (negative, fractional or not finite) and therefore matches nothing.
fn hover_query(time: Option<f64>) -> Option<Option<Timestamp>> {
    match time {
        None => Some(None),
        Some(t) if t.is_finite() && t >= 0.0 && t.fract() == 0.0 && t <= u64::MAX as f64 => {
            Some(Some(Timestamp::from_millis(t as u64)))
        }
        Some(_) => None,
    }
}

fn parse_key(symbol: &str, interval: &str) -> Result<SessionKey, ChartError> {
    let symbol = Symbol::new(symbol.to_string()).map_err(ChartError::InvalidInput)?;
    let interval = interval
        .parse::<TimeInterval>()
        .map_err(|_| ChartError::InvalidInput(format!("unknown interval: {interval}")))?;
    Ok(SessionKey::new(symbol, interval))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    JsValue::from_serde(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn to_js_error(err: ChartError) -> JsValue {
    JsValue::from_str(&err.to_string())
}
