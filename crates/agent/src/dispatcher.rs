//! Event Dispatcher
//!
//! Routes unsolicited `event` packets to handlers registered by event name.
//! An event nobody listens for is reported, never dropped.

use std::sync::Arc;

use dashmap::DashMap;
use debugger_protocol::Event;
use smallvec::SmallVec;

use crate::diagnostics::{Diagnostic, DiagnosticLog};

/// Event subscriber callback
pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

type Handlers = SmallVec<[EventCallback; 2]>;

pub struct EventDispatcher {
    /// Key: event name (e.g. "break"), Value: callbacks in registration order
    handlers: DashMap<String, Handlers>,
    diagnostics: Arc<DiagnosticLog>,
}

impl EventDispatcher {
    pub fn new(diagnostics: Arc<DiagnosticLog>) -> Self {
        Self {
            handlers: DashMap::new(),
            diagnostics,
        }
    }

    pub fn subscribe(&self, event: impl Into<String>, callback: EventCallback) {
        self.handlers.entry(event.into()).or_default().push(callback);
    }

    /// Remove every handler for `event`. Returns how many were removed.
    pub fn unsubscribe_all(&self, event: &str) -> usize {
        self.handlers
            .remove(event)
            .map(|(_, handlers)| handlers.len())
            .unwrap_or(0)
    }

    pub fn has_handlers(&self, event: &str) -> bool {
        self.handlers
            .get(event)
            .is_some_and(|handlers| !handlers.is_empty())
    }

    /// Route an event; report it when no handler took it
    pub fn dispatch(&self, event: &Event) -> usize {
        let called = self.notify(event);
        if called == 0 {
            self.diagnostics.report(Diagnostic::UnknownEvent {
                name: event.event.clone(),
            });
        }
        called
    }

    /// Route an event the agent already handled; silence is fine here
    pub fn notify(&self, event: &Event) -> usize {
        // Clone out so a callback may subscribe without deadlocking the map
        let handlers: Handlers = match self.handlers.get(&event.event) {
            Some(handlers) => handlers.value().clone(),
            None => return 0,
        };
        for callback in &handlers {
            callback(event);
        }
        handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(name: &str) -> Event {
        Event {
            seq: 1,
            event: name.to_string(),
            body: Some(json!({})),
            refs: Vec::new(),
        }
    }

    fn dispatcher() -> (EventDispatcher, Arc<DiagnosticLog>) {
        let log = Arc::new(DiagnosticLog::new(16, EventBus::new()));
        (EventDispatcher::new(log.clone()), log)
    }

    fn counter(count: &Arc<AtomicUsize>) -> EventCallback {
        let count = count.clone();
        Arc::new(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_fan_out_by_name() {
        let (dispatcher, log) = dispatcher();
        let breaks = Arc::new(AtomicUsize::new(0));
        let exits = Arc::new(AtomicUsize::new(0));

        dispatcher.subscribe("break", counter(&breaks));
        dispatcher.subscribe("exit", counter(&exits));

        assert_eq!(dispatcher.dispatch(&event("break")), 1);
        assert_eq!(breaks.load(Ordering::SeqCst), 1);
        assert_eq!(exits.load(Ordering::SeqCst), 0);

        assert_eq!(dispatcher.dispatch(&event("exit")), 1);
        assert_eq!(breaks.load(Ordering::SeqCst), 1);
        assert_eq!(exits.load(Ordering::SeqCst), 1);

        assert!(log.is_empty());
    }

    #[test]
    fn test_unknown_event_reported_once() {
        let (dispatcher, log) = dispatcher();

        assert_eq!(dispatcher.dispatch(&event("frobnicate")), 0);

        let reports = log.snapshot();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].to_string().contains("frobnicate"));
    }

    #[test]
    fn test_notify_stays_quiet() {
        let (dispatcher, log) = dispatcher();
        assert_eq!(dispatcher.notify(&event("break")), 0);
        assert!(log.is_empty());
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let (dispatcher, _log) = dispatcher();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        for id in 0..3 {
            let order = order.clone();
            dispatcher.subscribe(
                "appendText",
                Arc::new(move |_| order.lock().unwrap().push(id)),
            );
        }

        assert_eq!(dispatcher.dispatch(&event("appendText")), 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unsubscribe() {
        let (dispatcher, log) = dispatcher();
        let count = Arc::new(AtomicUsize::new(0));
        dispatcher.subscribe("break", counter(&count));

        assert!(dispatcher.has_handlers("break"));
        assert_eq!(dispatcher.unsubscribe_all("break"), 1);
        assert!(!dispatcher.has_handlers("break"));

        dispatcher.dispatch(&event("break"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(log.len(), 1);
    }
}
