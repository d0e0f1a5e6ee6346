use std::sync::{
    Arc, Mutex, RwLock,
    atomic::{AtomicU64, Ordering},
};

use globset::{Glob, GlobMatcher};
use tracing::trace;

use crate::{
    FlowError, Result, ShareLock,
    events::{Envelope, ExecutionEvent},
};

pub type EventHandler = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Which events a subscriber receives.
#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    /// glob pattern matched against the execution id, eg. `3f2a*`
    pub execution: String,

    /// glob pattern matched against the node id; events without a node match as ""
    pub node: String,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            execution: "*".to_string(),
            node: "*".to_string(),
        }
    }
}

impl SubscribeOptions {
    pub fn new(
        execution: &str,
        node: &str,
    ) -> Self {
        Self {
            execution: execution.to_string(),
            node: node.to_string(),
        }
    }

    /// Every event of one execution.
    pub fn execution(id: &str) -> Self {
        Self {
            execution: globset::escape(id),
            node: "*".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

struct Subscriber {
    handle: SubscriptionHandle,
    execution: GlobMatcher,
    node: GlobMatcher,
    handler: EventHandler,
}

impl Subscriber {
    fn matches(
        &self,
        e: &Envelope,
    ) -> bool {
        self.execution.is_match(&e.execution_id) && self.node.is_match(e.node_id.as_deref().unwrap_or_default())
    }
}

/// Fan-out of execution events to in-process subscribers.
///
/// Handlers run on the publishing thread. A dispatch lock serializes publishers so
/// every handler sees events in publish order.
pub struct EventBus {
    subscribers: ShareLock<Vec<Arc<Subscriber>>>,
    dispatch: Mutex<()>,
    next_handle: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn matcher(pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern).map(|g| g.compile_matcher()).map_err(|e| FlowError::Engine(format!("invalid subscribe pattern '{}': {}", pattern, e)))
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
            dispatch: Mutex::new(()),
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn subscribe(
        &self,
        options: SubscribeOptions,
        handler: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle> {
        let handle = SubscriptionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let subscriber = Subscriber {
            handle,
            execution: matcher(&options.execution)?,
            node: matcher(&options.node)?,
            handler: Arc::new(handler),
        };
        trace!("bus::subscribe({:?}, {:?})", handle, options);
        self.subscribers.write().unwrap_or_else(|e| e.into_inner()).push(Arc::new(subscriber));
        Ok(handle)
    }

    /// Returns false when the handle was not subscribed.
    pub fn unsubscribe(
        &self,
        handle: SubscriptionHandle,
    ) -> bool {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let before = subscribers.len();
        subscribers.retain(|s| s.handle != handle);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn publish(
        &self,
        execution_id: &str,
        event: ExecutionEvent,
    ) {
        let envelope = Envelope::new(execution_id, event);
        let _guard = self.dispatch.lock().unwrap_or_else(|e| e.into_inner());
        let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner()).clone();
        trace!("bus::publish({}, {})", execution_id, envelope.event_type());
        for s in subscribers.iter().filter(|s| s.matches(&envelope)) {
            (s.handler)(&envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ExecutionCancelled, LogEntry};

    fn log(msg: &str) -> ExecutionEvent {
        ExecutionEvent::Log(LogEntry::info(msg))
    }

    fn collect(
        bus: &EventBus,
        options: SubscribeOptions,
    ) -> (SubscriptionHandle, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let handle = bus
            .subscribe(options, move |e| {
                let msg = match &e.event {
                    ExecutionEvent::Log(l) => l.message.clone(),
                    other => other.event_type().to_string(),
                };
                s.lock().unwrap().push(format!("{}:{}", e.execution_id, msg));
            })
            .unwrap();
        (handle, seen)
    }

    #[test]
    fn test_publish_filters_by_execution() {
        let bus = EventBus::new();
        let (_, only_a) = collect(&bus, SubscribeOptions::execution("exec-a"));
        let (_, all) = collect(&bus, SubscribeOptions::default());

        bus.publish("exec-a", log("1"));
        bus.publish("exec-b", log("2"));
        bus.publish("exec-a", log("3"));

        assert_eq!(*only_a.lock().unwrap(), vec!["exec-a:1", "exec-a:3"]);
        assert_eq!(all.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_node_pattern() {
        let bus = EventBus::new();
        let (_, seen) = collect(&bus, SubscribeOptions::new("*", "llm*"));

        bus.publish("x", ExecutionEvent::Log(LogEntry::info("a").with_node("llm-1", "LLM")));
        bus.publish("x", ExecutionEvent::Log(LogEntry::info("b").with_node("code-1", "Code")));
        bus.publish("x", ExecutionEvent::Cancelled(ExecutionCancelled { reason: "stop".into() }));

        assert_eq!(*seen.lock().unwrap(), vec!["x:a"]);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let (handle, seen) = collect(&bus, SubscribeOptions::default());
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish("x", log("1"));
        assert!(bus.unsubscribe(handle));
        assert!(!bus.unsubscribe(handle));
        bus.publish("x", log("2"));

        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_pattern() {
        let bus = EventBus::new();
        assert!(bus.subscribe(SubscribeOptions::new("[", "*"), |_| {}).is_err());
    }

    #[test]
    fn test_publish_order_across_threads() {
        let bus = Arc::new(EventBus::new());
        let (_, seen) = collect(&bus, SubscribeOptions::default());

        let threads: Vec<_> = (0..4)
            .map(|t| {
                let bus = bus.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        bus.publish(&format!("t{t}"), log(&i.to_string()));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 100);
        for t in 0..4 {
            let prefix = format!("t{t}:");
            let mine: Vec<_> = seen.iter().filter(|s| s.starts_with(&prefix)).cloned().collect();
            let expected: Vec<_> = (0..25).map(|i| format!("t{t}:{i}")).collect();
            assert_eq!(mine, expected);
        }
    }
}
