use crate::domain::chart::ViewportCommand;
use crate::domain::market_data::{SessionKey, Timestamp};
use serde::Serialize;

/// Change notification fired after every successful mutation of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChartEvent {
    /// The session was cleared ahead of a (re)load.
    #[serde(rename_all = "camelCase")]
    SessionReset { key: SessionKey },
    #[serde(rename_all = "camelCase")]
    HistoryLoaded { key: SessionKey, bar_count: usize, viewport: ViewportCommand },
    #[serde(rename_all = "camelCase")]
    BarUpdated { open_time: Timestamp, viewport: ViewportCommand },
    #[serde(rename_all = "camelCase")]
    BarAppended { open_time: Timestamp, evicted: bool, viewport: ViewportCommand },
    /// Live updates stopped; history and indicators stay usable.
    #[serde(rename_all = "camelCase")]
    SubscriptionFailed { key: SessionKey, reason: String },
}

impl ChartEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ChartEvent::SessionReset { .. } => "SessionReset",
            ChartEvent::HistoryLoaded { .. } => "HistoryLoaded",
            ChartEvent::BarUpdated { .. } => "BarUpdated",
            ChartEvent::BarAppended { .. } => "BarAppended",
            ChartEvent::SubscriptionFailed { .. } => "SubscriptionFailed",
        }
    }

    pub fn viewport(&self) -> ViewportCommand {
        match self {
            ChartEvent::HistoryLoaded { viewport, .. }
            | ChartEvent::BarUpdated { viewport, .. }
            | ChartEvent::BarAppended { viewport, .. } => *viewport,
            _ => ViewportCommand::None,
        }
    }
}

/// Handle returned by [`EventDispatcher::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Publishes chart events to registered listeners
pub trait EventDispatcher {
    fn publish(&self, event: &ChartEvent);
}

/// Simple in-memory observer list
#[derive(Default)]
pub struct InMemoryEventDispatcher {
    next_id: u64,
    handlers: Vec<(ListenerId, Box<dyn Fn(&ChartEvent)>)>,
}

impl InMemoryEventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, handler: F) -> ListenerId
    where
        F: Fn(&ChartEvent) + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(existing, _)| *existing != id);
        self.handlers.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.handlers.len()
    }
}

impl EventDispatcher for InMemoryEventDispatcher {
    fn publish(&self, event: &ChartEvent) {
        for (_, handler) in &self.handlers {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market_data::{Symbol, TimeInterval};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn unsubscribed_listener_stops_receiving() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = InMemoryEventDispatcher::new();
        let sink = Rc::clone(&seen);
        let id = dispatcher.subscribe(move |e| sink.borrow_mut().push(e.event_type()));

        let key = SessionKey::new(Symbol::from("ETHUSDT"), TimeInterval::OneHour);
        dispatcher.publish(&ChartEvent::SessionReset { key: key.clone() });
        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));
        dispatcher.publish(&ChartEvent::SessionReset { key });

        assert_eq!(*seen.borrow(), vec!["SessionReset"]);
        assert_eq!(dispatcher.listener_count(), 0);
    }
}
