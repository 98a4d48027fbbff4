use crate::config::DEFAULT_STREAM_BASE;
use crate::domain::{
    errors::{ChartError, ChartResult},
    logging::LogComponent,
    market_data::{FeedSink, LiveBarFeed, SessionKey, SubscriptionHandle},
};
use crate::{log_debug, log_error, log_info, log_warn};
use futures::StreamExt;
use futures::future::{AbortHandle, Abortable};
use gloo_net::websocket::{Message, futures::WebSocket};
use gloo_timers::future::sleep;
use std::time::Duration;
use wasm_bindgen_futures::spawn_local;

const INITIAL_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 32;

/// Binance kline stream over gloo-net WebSocket.
///
/// Raw text frames go to the sink undecoded. Every drop is reported as a
/// [`ChartError::SubscriptionFailure`] and followed by a reconnect with
/// exponential backoff, until the subscription handle is released.
#[derive(Debug, Clone)]
pub struct BinanceLiveFeed {
    stream_base: String,
}

impl Default for BinanceLiveFeed {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_BASE)
    }
}

impl BinanceLiveFeed {
    pub fn new(stream_base: impl Into<String>) -> Self {
        Self { stream_base: stream_base.into() }
    }

    pub fn stream_url(&self, key: &SessionKey) -> String {
        format!("{}/{}", self.stream_base.trim_end_matches('/'), key.stream_name())
    }
}

impl LiveBarFeed for BinanceLiveFeed {
    fn subscribe(&self, key: &SessionKey, sink: FeedSink) -> ChartResult<SubscriptionHandle> {
        let url = self.stream_url(key);
        let (abort, registration) = AbortHandle::new_pair();
        let handle = sink.handle().with_abort(abort);

        let task = Abortable::new(run_stream(url, sink), registration);
        spawn_local(async move {
            if task.await.is_err() {
                log_debug!(LogComponent::Infrastructure("BinanceWS"), "stream task aborted");
            }
        });
        Ok(handle)
    }
}

async fn run_stream(url: String, sink: FeedSink) {
    let mut delay = INITIAL_BACKOFF_SECS;

    while !sink.is_closed() {
        match WebSocket::open(&url) {
            Ok(mut ws) => {
                log_info!(LogComponent::Infrastructure("BinanceWS"), "connected to {}", url);
                let mut failure = String::from("stream closed by server");

                while let Some(msg) = ws.next().await {
                    match msg {
                        Ok(Message::Text(text)) => {
                            delay = INITIAL_BACKOFF_SECS;
                            if !sink.send_frame(text) {
                                return;
                            }
                        }
                        Ok(Message::Bytes(_)) => {}
                        Err(e) => {
                            failure = format!("{e:?}");
                            break;
                        }
                    }
                }

                if sink.is_closed() {
                    return;
                }
                log_error!(LogComponent::Infrastructure("BinanceWS"), "{}: {}", url, failure);
                sink.send_error(ChartError::SubscriptionFailure(failure));
            }
            Err(e) => {
                log_error!(LogComponent::Infrastructure("BinanceWS"), "failed to open {}: {:?}", url, e);
                sink.send_error(ChartError::SubscriptionFailure(format!("failed to open WebSocket: {e:?}")));
            }
        }

        if sink.is_closed() {
            return;
        }
        log_warn!(LogComponent::Infrastructure("BinanceWS"), "reconnecting in {}s", delay);
        sleep(Duration::from_secs(delay)).await;
        delay = (delay * 2).min(MAX_BACKOFF_SECS);
    }
}
